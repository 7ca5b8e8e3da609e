//! No-op knowledge store, used when retrieval is disabled.

use async_trait::async_trait;
use cbtsim_core::error::KnowledgeError;
use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeQuery, KnowledgeStore};

/// Accepts writes, discards them, and never returns results.
pub struct NoopStore;

#[async_trait]
impl KnowledgeStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn store(&self, _entry: KnowledgeEntry) -> Result<String, KnowledgeError> {
        Ok(String::new())
    }

    async fn search(&self, _query: KnowledgeQuery) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _id: &str) -> Result<bool, KnowledgeError> {
        Ok(false)
    }

    async fn get(&self, _id: &str) -> Result<Option<KnowledgeEntry>, KnowledgeError> {
        Ok(None)
    }

    async fn count(&self) -> Result<usize, KnowledgeError> {
        Ok(0)
    }

    async fn clear(&self) -> Result<(), KnowledgeError> {
        Ok(())
    }
}
