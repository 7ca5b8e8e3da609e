//! Session conclusion: a single closing message that invites no reply.

use tracing::warn;

use crate::generator::Generator;
use crate::prompts::CONCLUSION;

pub const FALLBACK_CONCLUSION: &str = "Thank you for sharing so openly today. \
Your willingness to explore your thoughts and feelings shows real courage. \
Continue to be patient and kind with yourself as you work through these challenges. \
Remember that growth takes time, and you're taking important steps forward.";

const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}', '*'];

fn ends_with_question(text: &str) -> bool {
    text.trim_end_matches(|c: char| c.is_whitespace() || CLOSERS.contains(&c))
        .ends_with('?')
}

/// Drop trailing question sentences so the text never ends by inviting a
/// reply. Returns an empty string if every sentence is a question.
pub fn strip_trailing_questions(text: &str) -> String {
    let mut current = text.trim();
    while ends_with_question(current) {
        let body = current
            .trim_end_matches(|c: char| c.is_whitespace() || CLOSERS.contains(&c))
            .trim_end_matches('?');
        current = match body.rfind(['.', '!', '?', '\n']) {
            Some(idx) => body[..=idx].trim(),
            None => "",
        };
    }
    current.to_string()
}

/// A conclusion plus whether the fixed closing text was used.
#[derive(Debug, Clone, PartialEq)]
pub struct Conclusion {
    pub text: String,
    pub fallback: bool,
}

pub struct ConclusionGenerator {
    generator: Generator,
    temperature: f32,
}

impl ConclusionGenerator {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            temperature: 0.1,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Generate the closing message from the conversation context. Never fails.
    pub async fn conclude(&self, context: &str) -> Conclusion {
        let result = match CONCLUSION.render(&[("context", context)]) {
            Ok(prompt) => self
                .generator
                .generate_with(&prompt, self.temperature)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(raw) => {
                let text = strip_trailing_questions(&raw);
                if text.is_empty() {
                    warn!("Conclusion was only questions; using fixed closing");
                    return Conclusion {
                        text: FALLBACK_CONCLUSION.to_string(),
                        fallback: true,
                    };
                }
                Conclusion { text, fallback: false }
            }
            Err(error) => {
                warn!(%error, "Conclusion generation failed; using fixed closing");
                Conclusion {
                    text: FALLBACK_CONCLUSION.to_string(),
                    fallback: true,
                }
            }
        }
    }
}
