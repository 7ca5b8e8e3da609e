//! Retriever trait — the uniform `retrieve(query, k)` contract.
//!
//! The pipeline only ever sees ranked text snippets. Whether they come from a
//! local JSONL store, an in-memory index, or a hosted vector database is an
//! implementation detail of the retriever.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::KnowledgeError;

/// A single retrieved snippet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    /// The snippet text
    pub text: String,

    /// Metadata carried over from the store
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Similarity score (higher is better)
    #[serde(default)]
    pub score: f32,
}

impl RetrievedSnippet {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: serde_json::Map::new(),
            score: 0.0,
        }
    }

    /// Whether the snippet is a client/therapist conversation exemplar
    /// rather than plain reference knowledge.
    pub fn is_conversation_exemplar(&self) -> bool {
        self.text.contains("Client:") && self.text.contains("Therapist:")
    }
}

/// The retrieval contract consumed by the pipeline.
///
/// Returns at most `k` snippets ordered by descending similarity. No ordering
/// guarantee is made between ties.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// A human-readable name (e.g., "file", "none").
    fn name(&self) -> &str;

    async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<RetrievedSnippet>, KnowledgeError>;
}

/// A retriever that never returns anything. Used when retrieval is disabled.
pub struct NoRetrieval;

#[async_trait]
impl Retriever for NoRetrieval {
    fn name(&self) -> &str {
        "none"
    }

    async fn retrieve(
        &self,
        _query: &str,
        _k: usize,
    ) -> std::result::Result<Vec<RetrievedSnippet>, KnowledgeError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exemplar_heuristic_requires_both_labels() {
        assert!(RetrievedSnippet::new("Client: I feel stuck.\nTherapist: What makes it feel that way?")
            .is_conversation_exemplar());
        assert!(!RetrievedSnippet::new("Client concern: I feel stuck.").is_conversation_exemplar());
        assert!(!RetrievedSnippet::new("Cognitive Restructuring: identify the thought.")
            .is_conversation_exemplar());
    }

    #[tokio::test]
    async fn no_retrieval_is_empty() {
        let snippets = NoRetrieval.retrieve("anything", 4).await.unwrap();
        assert!(snippets.is_empty());
    }
}
