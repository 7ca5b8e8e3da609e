//! Embedding adapter over a generation provider.

use cbtsim_core::error::KnowledgeError;
use cbtsim_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;

/// Embeds text through a provider's embedding endpoint.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed `inputs`, one vector per input in the same order.
    pub async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        let expected = inputs.len();
        if expected == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs,
            })
            .await
            .map_err(|e| KnowledgeError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(KnowledgeError::EmbeddingFailed(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    /// Embed a single query string.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        self.embed(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| KnowledgeError::EmbeddingFailed("empty embedding response".into()))
    }
}
