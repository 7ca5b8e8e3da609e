//! The retrieval adapter: `retrieve(query, k)` over a knowledge store.

use async_trait::async_trait;
use cbtsim_core::error::KnowledgeError;
use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeQuery, KnowledgeStore, SearchMode};
use cbtsim_core::retrieval::{RetrievedSnippet, Retriever};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::embedding::Embedder;

pub struct StoreRetriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: Option<Embedder>,
    min_score: f32,
}

impl StoreRetriever {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            embedder: None,
            min_score: 0.0,
        }
    }

    /// Embed queries for hybrid search.
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    async fn query_embedding(&self, query: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed_one(query).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "Query embedding failed; using keyword search");
                None
            }
        }
    }
}

fn to_snippet(entry: KnowledgeEntry) -> RetrievedSnippet {
    let mut metadata = entry.metadata;
    metadata.insert("kind".into(), entry.kind.as_str().into());
    if let Some(source) = entry.source {
        metadata.insert("source".into(), source.into());
    }
    RetrievedSnippet {
        text: entry.content,
        metadata,
        score: entry.score,
    }
}

#[async_trait]
impl Retriever for StoreRetriever {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedSnippet>, KnowledgeError> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.query_embedding(query).await;
        let mode = if embedding.is_some() {
            SearchMode::Hybrid
        } else {
            SearchMode::Keyword
        };

        let mut results = self
            .store
            .search(KnowledgeQuery {
                text: query.to_string(),
                limit: k,
                min_score: self.min_score,
                embedding,
                mode,
            })
            .await?;
        results.truncate(k);

        debug!(backend = self.store.name(), k, found = results.len(), "Knowledge retrieved");
        Ok(results.into_iter().map(to_snippet).collect())
    }
}
