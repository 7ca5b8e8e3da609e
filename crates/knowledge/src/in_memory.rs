//! In-memory knowledge store, useful for testing and ephemeral runs.

use async_trait::async_trait;
use cbtsim_core::error::KnowledgeError;
use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeQuery, KnowledgeStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::vector::run_query;

/// A knowledge store that keeps entries in a Vec.
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<KnowledgeEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn assign_id(entry: &mut KnowledgeEntry) -> Result<String, KnowledgeError> {
    if entry.content.trim().is_empty() {
        return Err(KnowledgeError::InvalidDocument("entry content is empty".into()));
    }
    if entry.id.is_empty() {
        entry.id = Uuid::new_v4().to_string();
    }
    Ok(entry.id.clone())
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn store(&self, mut entry: KnowledgeEntry) -> Result<String, KnowledgeError> {
        let id = assign_id(&mut entry)?;
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn search(&self, query: KnowledgeQuery) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        let entries = self.entries.read().await;
        Ok(run_query(&entries, &query))
    }

    async fn delete(&self, id: &str) -> Result<bool, KnowledgeError> {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() < len_before)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>, KnowledgeError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    async fn count(&self) -> Result<usize, KnowledgeError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), KnowledgeError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbtsim_core::knowledge::KnowledgeKind;

    fn technique(content: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(content, KnowledgeKind::Technique)
    }

    #[tokio::test]
    async fn store_assigns_id_and_get_returns_entry() {
        let store = InMemoryStore::new();
        let id = store
            .store(technique("Behavioral activation schedules rewarding activities"))
            .await
            .unwrap();
        assert!(!id.is_empty());

        let entry = store.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.kind, KnowledgeKind::Technique);
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let store = InMemoryStore::new();
        let err = store.store(technique("   ")).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidDocument(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_by_keyword() {
        let store = InMemoryStore::new();
        store.store(technique("Exposure therapy reduces avoidance of feared situations")).await.unwrap();
        store.store(technique("Mindfulness builds acceptance of difficult thoughts")).await.unwrap();

        let results = store
            .search(KnowledgeQuery::keyword("avoidance of feared situations", 4))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("Exposure"));
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let store = InMemoryStore::new();
        for i in 0..10 {
            store.store(technique(&format!("anxiety note number {i}"))).await.unwrap();
        }
        let results = store.search(KnowledgeQuery::keyword("anxiety", 3)).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = InMemoryStore::new();
        let id = store.store(technique("To be deleted")).await.unwrap();
        store.store(technique("Kept for now")).await.unwrap();

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_batch_stores_all() {
        let store = InMemoryStore::new();
        let ids = store
            .store_batch(vec![technique("one entry"), technique("two entry")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
