//! Knowledge store trait — the reference material behind retrieval.
//!
//! The store holds CBT technique descriptions and client/therapist
//! conversation exemplars. It is populated out-of-band (bulk load) and read
//! on the turn path only through the [`Retriever`](crate::retrieval::Retriever)
//! contract. It supports:
//! - Keyword search (term overlap)
//! - Vector search (cosine similarity over stored embeddings)
//! - Hybrid search (rank fusion of both)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::KnowledgeError;

/// What kind of reference material an entry holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    /// Description of a CBT technique
    Technique,
    /// A paired client message and therapist reply
    TherapyConversation,
    /// A client message without a reply
    ClientConcern,
    /// A therapist reply without the prompting message
    TherapeuticResponse,
    /// Anything else
    #[default]
    Reference,
}

impl KnowledgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeKind::Technique => "technique",
            KnowledgeKind::TherapyConversation => "therapy_conversation",
            KnowledgeKind::ClientConcern => "client_concern",
            KnowledgeKind::TherapeuticResponse => "therapeutic_response",
            KnowledgeKind::Reference => "reference",
        }
    }
}

/// A single chunk of reference material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique ID for this entry
    pub id: String,

    /// The text content
    pub content: String,

    /// What kind of material this is
    #[serde(default)]
    pub kind: KnowledgeKind,

    /// Free-form metadata (technique name, dataset name, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Where the entry came from (dataset name, "builtin", file path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// When this entry was stored
    pub created_at: DateTime<Utc>,

    /// Relevance score (set by search operations)
    #[serde(default)]
    pub score: f32,

    /// Optional embedding vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl KnowledgeEntry {
    /// Create an entry with an empty ID (the store assigns one).
    pub fn new(content: impl Into<String>, kind: KnowledgeKind) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            kind,
            metadata: serde_json::Map::new(),
            source: None,
            created_at: Utc::now(),
            score: 0.0,
            embedding: None,
        }
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Set the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A query for searching the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    /// The search text
    pub text: String,

    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Minimum relevance score threshold
    #[serde(default)]
    pub min_score: f32,

    /// Query embedding, used by vector and hybrid search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Search mode
    #[serde(default)]
    pub mode: SearchMode,
}

fn default_limit() -> usize {
    4
}

impl KnowledgeQuery {
    /// A keyword query returning at most `limit` entries.
    pub fn keyword(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            min_score: 0.0,
            embedding: None,
            mode: SearchMode::Keyword,
        }
    }
}

/// How to search the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Term-overlap search only
    Keyword,
    /// Vector similarity only (cosine)
    Vector,
    /// Rank fusion of both (default); falls back to keyword without embeddings
    #[default]
    Hybrid,
}

/// The core KnowledgeStore trait.
///
/// Implementations: JSONL file, in-memory (for testing), none (no-op).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "file", "memory", "none").
    fn name(&self) -> &str;

    /// Store a new entry, returning its ID.
    async fn store(&self, entry: KnowledgeEntry) -> std::result::Result<String, KnowledgeError>;

    /// Store many entries at once. Default: one `store` per entry.
    async fn store_batch(
        &self,
        entries: Vec<KnowledgeEntry>,
    ) -> std::result::Result<Vec<String>, KnowledgeError> {
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(self.store(entry).await?);
        }
        Ok(ids)
    }

    /// Search entries, most relevant first.
    async fn search(&self, query: KnowledgeQuery) -> std::result::Result<Vec<KnowledgeEntry>, KnowledgeError>;

    /// Delete an entry by ID.
    async fn delete(&self, id: &str) -> std::result::Result<bool, KnowledgeError>;

    /// Get an entry by ID.
    async fn get(&self, id: &str) -> std::result::Result<Option<KnowledgeEntry>, KnowledgeError>;

    /// Get total entry count.
    async fn count(&self) -> std::result::Result<usize, KnowledgeError>;

    /// Remove all entries.
    async fn clear(&self) -> std::result::Result<(), KnowledgeError>;
}
