//! File-based knowledge store: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `KnowledgeEntry`.
//! Storage location: `~/.cbtsim/knowledge/knowledge.jsonl`

use async_trait::async_trait;
use cbtsim_core::error::KnowledgeError;
use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeQuery, KnowledgeStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::in_memory::assign_id;
use crate::vector::run_query;

/// A file-backed knowledge store using JSONL (one JSON object per line).
///
/// Entries are loaded on creation and flushed to disk on every mutation.
/// Reads never touch the disk.
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<KnowledgeEntry>>>,
}

impl FileStore {
    /// Open (or lazily create) a store at the given path.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "Knowledge file loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Default path: `~/.cbtsim/knowledge/knowledge.jsonl`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".cbtsim")
            .join("knowledge")
            .join("knowledge.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<KnowledgeEntry> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Vec::new();
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<KnowledgeEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted knowledge entry");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self, entries: &[KnowledgeEntry]) -> Result<(), KnowledgeError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                KnowledgeError::Storage(format!("Failed to create knowledge directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                KnowledgeError::Storage(format!("Failed to serialize knowledge entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("Failed to write knowledge file: {e}")))
    }
}

#[async_trait]
impl KnowledgeStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn store(&self, mut entry: KnowledgeEntry) -> Result<String, KnowledgeError> {
        let id = assign_id(&mut entry)?;
        let mut entries = self.entries.write().await;
        entries.push(entry);
        if let Err(e) = self.flush(&entries).await {
            entries.pop();
            return Err(e);
        }
        Ok(id)
    }

    /// Appends the whole batch with a single flush.
    async fn store_batch(
        &self,
        batch: Vec<KnowledgeEntry>,
    ) -> Result<Vec<String>, KnowledgeError> {
        let mut prepared = Vec::with_capacity(batch.len());
        let mut ids = Vec::with_capacity(batch.len());
        for mut entry in batch {
            ids.push(assign_id(&mut entry)?);
            prepared.push(entry);
        }

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.extend(prepared);
        if let Err(e) = self.flush(&entries).await {
            entries.truncate(before);
            return Err(e);
        }
        Ok(ids)
    }

    async fn search(&self, query: KnowledgeQuery) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        let entries = self.entries.read().await;
        Ok(run_query(&entries, &query))
    }

    async fn delete(&self, id: &str) -> Result<bool, KnowledgeError> {
        let mut entries = self.entries.write().await;
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let removed = entries.remove(pos);
        if let Err(e) = self.flush(&entries).await {
            entries.insert(pos, removed);
            return Err(e);
        }
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>, KnowledgeError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    async fn count(&self) -> Result<usize, KnowledgeError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), KnowledgeError> {
        let mut entries = self.entries.write().await;
        let previous = std::mem::take(&mut *entries);
        if let Err(e) = self.flush(&entries).await {
            *entries = previous;
            return Err(e);
        }
        Ok(())
    }
}
