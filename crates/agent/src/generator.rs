//! The `generate(prompt) -> text` contract over a [`Provider`].

use cbtsim_core::error::ProviderError;
use cbtsim_core::message::Message;
use cbtsim_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::debug;

/// Sends a rendered prompt as a single user message and returns the trimmed
/// completion text.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system: Option<String>,
}

impl Generator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            system: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Prepend a system prompt to every request.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.generate_with(prompt, self.temperature).await
    }

    /// Generate with an explicit temperature.
    ///
    /// A blank completion is reported as an `ApiError`.
    pub async fn generate_with(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            system: self.system.clone(),
            messages: vec![Message::user(prompt)],
            temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            temperature,
            prompt_chars = prompt.len(),
            "Generating"
        );

        let response = self.provider.complete(request).await?;
        let text = response.message.content.trim();
        if text.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "empty completion".into(),
            });
        }
        Ok(text.to_string())
    }
}
