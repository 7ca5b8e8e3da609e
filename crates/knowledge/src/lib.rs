//! Knowledge stores, ingestion, and retrieval for cbtsim.

pub mod chunker;
pub mod dataset;
pub mod embedding;
pub mod file_backend;
pub mod in_memory;
pub mod ingest;
pub mod noop;
pub mod retriever;
pub mod seed;
pub mod vector;

pub use chunker::TextChunker;
pub use embedding::Embedder;
pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use ingest::{IngestReport, Ingestor};
pub use noop::NoopStore;
pub use retriever::StoreRetriever;
pub use seed::seed_entries;
pub use vector::{cosine_similarity, reciprocal_rank_fusion, vector_search};

use cbtsim_core::knowledge::KnowledgeStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Open the store named by `backend` ("file", "memory" or "none").
///
/// Unknown names fall back to the file store at `path`.
pub fn open_store(backend: &str, path: PathBuf) -> Arc<dyn KnowledgeStore> {
    match backend {
        "memory" => Arc::new(InMemoryStore::new()),
        "none" => Arc::new(NoopStore),
        _ => Arc::new(FileStore::new(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_store_by_backend_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.jsonl");
        assert_eq!(open_store("memory", path.clone()).name(), "memory");
        assert_eq!(open_store("none", path.clone()).name(), "none");
        assert_eq!(open_store("file", path).name(), "file");
    }
}
