//! The Message Classifier: routes each incoming message to a handler.

use cbtsim_core::session::Classification;
use tracing::{debug, warn};

use crate::generator::Generator;
use crate::prompts::CLASSIFICATION;

pub struct MessageClassifier {
    generator: Generator,
    temperature: f32,
}

impl MessageClassifier {
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

    /// Classify `message` given the rendered conversation context.
    ///
    /// Unrecognised output and call failures both yield
    /// [`Classification::Therapeutic`].
    pub async fn classify(&self, message: &str, context: &str) -> Classification {
        let prompt = match CLASSIFICATION.render(&[("message", message), ("context", context)]) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Classification prompt failed; defaulting to THERAPEUTIC");
                return Classification::Therapeutic;
            }
        };

        match self.generator.generate_with(&prompt, self.temperature).await {
            Ok(raw) => match Classification::parse(&raw) {
                Some(c) => {
                    debug!(classification = %c, "Message classified");
                    c
                }
                None => {
                    warn!(output = %raw, "Unrecognised classification; defaulting to THERAPEUTIC");
                    Classification::Therapeutic
                }
            },
            Err(e) => {
                warn!(error = %e, "Classification failed; defaulting to THERAPEUTIC");
                Classification::Therapeutic
            }
        }
    }
}
