//! Lightweight single-call responder for greeting, procedural and small-talk
//! turns.

use cbtsim_core::session::Classification;
use tracing::warn;

use crate::generator::Generator;
use crate::prompts::{GREETING, PROCEDURAL, PromptTemplate, SMALL_TALK};

pub const FALLBACK_RESPONSE: &str =
    "Thank you for sharing that. What would you like to talk about today?";

pub struct SimpleResponder {
    generator: Generator,
    temperature: f32,
}

impl SimpleResponder {
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

    fn template_for(route: Classification) -> Option<PromptTemplate> {
        match route {
            Classification::Greeting => Some(GREETING),
            Classification::Procedural => Some(PROCEDURAL),
            Classification::SmallTalk => Some(SMALL_TALK),
            Classification::SessionEnd | Classification::Therapeutic => None,
        }
    }

    /// Reply to a simple-route message. Never fails.
    pub async fn respond(&self, route: Classification, message: &str, context: &str) -> String {
        let Some(template) = Self::template_for(route) else {
            warn!(%route, "No lightweight prompt for route; using fallback reply");
            return FALLBACK_RESPONSE.to_string();
        };

        let result = match template.render(&[("message", message), ("context", context)]) {
            Ok(prompt) => self
                .generator
                .generate_with(&prompt, self.temperature)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        result.unwrap_or_else(|error| {
            warn!(%error, %route, "Simple response failed; using fallback reply");
            FALLBACK_RESPONSE.to_string()
        })
    }
}
