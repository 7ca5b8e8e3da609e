//! The Context Summarizer: compresses a session log into a bounded summary.

use cbtsim_core::message::Message;
use tracing::warn;

use crate::generator::Generator;
use crate::prompts::SUMMARY;

/// A summary plus whether the templated fallback was used.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub text: String,
    pub fallback: bool,
}

/// The deterministic summary used when generation fails.
pub fn fallback_summary(message_count: usize) -> String {
    format!(
        "Patient has discussed various concerns over {message_count} messages. \
         Key themes include emotional and behavioral challenges that require continued therapeutic support."
    )
}

/// Render messages as "Role: content" lines.
pub fn transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        out.push_str(&m.transcript_line());
        out.push('\n');
    }
    out
}

pub struct ContextSummarizer {
    generator: Generator,
    temperature: f32,
    max_words: usize,
}

impl ContextSummarizer {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            temperature: 0.1,
            max_words: 300,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    /// Summarise the entire history. Never fails.
    pub async fn summarize(&self, messages: &[Message]) -> Summary {
        let conversation = transcript(messages);
        let max_words = self.max_words.to_string();

        let result = match SUMMARY.render(&[("conversation", &conversation), ("max_words", &max_words)]) {
            Ok(prompt) => self
                .generator
                .generate_with(&prompt, self.temperature)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(text) => Summary { text, fallback: false },
            Err(error) => {
                warn!(%error, message_count = messages.len(), "Summary generation failed; using fallback");
                Summary {
                    text: fallback_summary(messages.len()),
                    fallback: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use std::sync::Arc;

    fn log() -> Vec<Message> {
        vec![
            Message::user("I keep worrying about my job."),
            Message::assistant("What goes through your mind when the worry starts?"),
        ]
    }

    #[tokio::test]
    async fn summary_covers_whole_history_at_low_temperature() {
        let provider = Arc::new(ScriptedProvider::new(["Client worries about job security."]));
        let summarizer = ContextSummarizer::new(Generator::new(provider.clone(), "m"));

        let summary = summarizer.summarize(&log()).await;
        assert_eq!(summary.text, "Client worries about job security.");
        assert!(!summary.fallback);

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("User: I keep worrying about my job."));
        assert!(prompt.contains("Assistant: What goes through your mind"));
        assert!(prompt.contains("at most 300 words"));
        assert!((provider.requests()[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn failure_degrades_to_template() {
        let summarizer = ContextSummarizer::new(Generator::new(Arc::new(ScriptedProvider::failing()), "m"));
        let summary = summarizer.summarize(&log()).await;
        assert!(summary.fallback);
        assert_eq!(summary.text, fallback_summary(2));
        assert!(summary.text.contains("over 2 messages"));
    }
}
