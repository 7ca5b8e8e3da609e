//! Conversation context rendering.

use cbtsim_core::message::Message;
use cbtsim_core::session::Session;

/// Decides how much of a session log goes into a prompt.
///
/// Short logs are rendered in full. Longer logs are rendered as the rolling
/// summary followed by the last `recent_window` messages verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub full_history_limit: usize,
    pub recent_window: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            full_history_limit: 6,
            recent_window: 4,
        }
    }
}

impl ContextWindow {
    pub fn new(full_history_limit: usize, recent_window: usize) -> Self {
        Self {
            full_history_limit,
            recent_window,
        }
    }

    /// Whether a log of `len` messages is rendered in full.
    pub fn is_full_history(&self, len: usize) -> bool {
        len <= self.full_history_limit
    }

    pub fn render(&self, session: &Session) -> String {
        let messages = session.messages();
        let mut context = if self.is_full_history(messages.len()) {
            let mut out = String::from("Full conversation history:\n");
            push_lines(&mut out, messages);
            out
        } else {
            let mut out = format!("Conversation Summary: {}\n\nRecent conversation:\n", session.summary);
            push_lines(&mut out, session.recent(self.recent_window));
            out
        };
        context.push_str(&state_annotation(messages.len()));
        context
    }
}

fn push_lines(out: &mut String, messages: &[Message]) {
    for m in messages {
        out.push_str(&m.transcript_line());
        out.push('\n');
    }
}

/// The conversation-state hint appended to every context.
///
/// Empty for a single-message log.
pub fn state_annotation(len: usize) -> String {
    match len {
        0 => "\nCONVERSATION STATE: This is the very first interaction with this patient. \
              A greeting is appropriate."
            .to_string(),
        1 => String::new(),
        n => format!(
            "\nCONVERSATION STATE: This is an ongoing conversation with {} previous exchanges. \
             The therapeutic relationship is already established. Do NOT greet the patient again.",
            n / 2
        ),
    }
}
