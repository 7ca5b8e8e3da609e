//! Bulk ingestion: chunk documents, optionally embed, then store.

use cbtsim_core::error::KnowledgeError;
use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chunker::TextChunker;
use crate::embedding::Embedder;

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub embedded: usize,
}

pub struct Ingestor {
    store: Arc<dyn KnowledgeStore>,
    chunker: TextChunker,
    embedder: Option<Embedder>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn KnowledgeStore>, chunker: TextChunker) -> Self {
        Self {
            store,
            chunker,
            embedder: None,
        }
    }

    /// Attach embeddings to every stored chunk.
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Split each document into chunks that inherit its kind, metadata and
    /// source. Multi-chunk documents get a `chunk` index in metadata.
    pub fn chunk(&self, documents: Vec<KnowledgeEntry>) -> Vec<KnowledgeEntry> {
        let mut chunks = Vec::new();
        for doc in documents {
            let pieces = self.chunker.split(&doc.content);
            let multi = pieces.len() > 1;
            for (index, piece) in pieces.into_iter().enumerate() {
                let mut chunk = doc.clone();
                chunk.id = String::new();
                chunk.content = piece;
                if multi {
                    chunk.metadata.insert("chunk".into(), index.into());
                }
                chunks.push(chunk);
            }
        }
        chunks
    }

    /// Chunk, embed (best effort) and store `documents`.
    ///
    /// Embedding failure is not fatal: the chunks are stored without vectors
    /// and remain reachable by keyword search.
    pub async fn ingest(&self, documents: Vec<KnowledgeEntry>) -> Result<IngestReport, KnowledgeError> {
        let documents_len = documents.len();
        let mut chunks = self.chunk(documents);
        let mut embedded = 0;

        if let Some(embedder) = &self.embedder {
            let inputs = chunks.iter().map(|c| c.content.clone()).collect();
            match embedder.embed(inputs).await {
                Ok(vectors) => {
                    embedded = vectors.len();
                    for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                        chunk.embedding = Some(vector);
                    }
                }
                Err(e) => warn!(error = %e, "Embedding failed; storing chunks without vectors"),
            }
        }

        let stored = self.store.store_batch(chunks).await?.len();
        info!(
            store = self.store.name(),
            documents = documents_len,
            chunks = stored,
            embedded,
            "Knowledge ingested"
        );

        Ok(IngestReport {
            documents: documents_len,
            chunks: stored,
            embedded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use crate::seed::seed_entries;
    use async_trait::async_trait;
    use cbtsim_core::error::ProviderError;
    use cbtsim_core::knowledge::KnowledgeKind;
    use cbtsim_core::provider::*;

    struct LengthEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Provider for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("completion".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            if self.fail {
                return Err(ProviderError::Timeout("embedding".into()));
            }
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|t| vec![t.len() as f32, 1.0]).collect(),
                model: request.model,
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn seed_ingest_stores_all_techniques() {
        let store = Arc::new(InMemoryStore::new());
        let report = Ingestor::new(store.clone(), TextChunker::default())
            .ingest(seed_entries())
            .await
            .unwrap();

        assert_eq!(report.documents, 6);
        assert!(report.chunks >= 6);
        assert_eq!(report.embedded, 0);
        assert_eq!(store.count().await.unwrap(), report.chunks);
    }

    #[tokio::test]
    async fn long_documents_are_chunked_with_index() {
        let ingestor = Ingestor::new(Arc::new(InMemoryStore::new()), TextChunker::new(60, 10));
        let doc = KnowledgeEntry::new("Notice the thought. ".repeat(10), KnowledgeKind::Technique)
            .with_metadata("technique", "ABC Model");
        let chunks = ingestor.chunk(vec![doc]);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.kind, KnowledgeKind::Technique);
            assert_eq!(chunk.metadata["technique"], "ABC Model");
            assert_eq!(chunk.metadata["chunk"], i);
        }
    }

    #[tokio::test]
    async fn embeddings_attached_when_available() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Embedder::new(Arc::new(LengthEmbedder { fail: false }), "test-embed");
        let report = Ingestor::new(store.clone(), TextChunker::default())
            .with_embedder(embedder)
            .ingest(vec![KnowledgeEntry::new("short note", KnowledgeKind::Reference)])
            .await
            .unwrap();

        assert_eq!(report.embedded, 1);
        let stored = store
            .search(cbtsim_core::knowledge::KnowledgeQuery::keyword("short note", 1))
            .await
            .unwrap();
        assert!(stored[0].embedding.is_some());
    }

    #[tokio::test]
    async fn embedding_failure_still_stores() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Embedder::new(Arc::new(LengthEmbedder { fail: true }), "test-embed");
        let report = Ingestor::new(store.clone(), TextChunker::default())
            .with_embedder(embedder)
            .ingest(vec![KnowledgeEntry::new("short note", KnowledgeKind::Reference)])
            .await
            .unwrap();

        assert_eq!(report.embedded, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
