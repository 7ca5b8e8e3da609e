//! Wires configuration into a ready-to-use [`SessionController`].
//!
//! Shared by the HTTP gateway and the terminal chat so both run turns
//! through the same stack.

use cbtsim_agent::prompts::THERAPIST_SYSTEM_PROMPT;
use cbtsim_agent::{ContextSummarizer, Generator, Pipeline};
use cbtsim_config::AppConfig;
use cbtsim_core::error::{Error, ProviderError};
use cbtsim_core::event::EventBus;
use cbtsim_core::provider::Provider;
use cbtsim_core::retrieval::{NoRetrieval, Retriever};
use cbtsim_knowledge::{Embedder, StoreRetriever, open_store};
use cbtsim_session::{SessionController, SessionStore};
use std::sync::Arc;
use tracing::info;

pub struct Services {
    pub controller: Arc<SessionController>,
    pub events: Arc<EventBus>,
    pub provider_name: String,
    /// "none" when retrieval is disabled
    pub retrieval_backend: String,
}

/// Build the retriever described by `[retrieval]`.
pub fn build_retriever(config: &AppConfig, provider: Arc<dyn Provider>) -> Arc<dyn Retriever> {
    let retrieval = &config.retrieval;
    if !retrieval.enabled || retrieval.backend == "none" {
        return Arc::new(NoRetrieval);
    }

    let store = open_store(&retrieval.backend, retrieval.knowledge_path());
    let mut retriever = StoreRetriever::new(store).with_min_score(retrieval.min_score);
    if retrieval.use_embeddings {
        retriever = retriever.with_embedder(Embedder::new(provider, &retrieval.embedding_model));
    }
    Arc::new(retriever)
}

pub fn build_services(config: &AppConfig) -> Result<Services, Error> {
    let router = cbtsim_providers::build_from_config(config);
    let provider = router
        .default()
        .ok_or_else(|| ProviderError::NotConfigured(config.default_provider.clone()))?;
    Ok(assemble(config, provider, router.default_name()))
}

/// Build the session stack on top of an already-resolved provider.
///
/// Only the therapeutic pipeline speaks with the therapist system prompt.
/// Routing, simple replies, summaries and conclusions use plain requests.
pub fn assemble(config: &AppConfig, provider: Arc<dyn Provider>, provider_name: &str) -> Services {
    let events = Arc::new(EventBus::default());
    let base = Generator::new(provider.clone(), &config.default_model).with_max_tokens(config.max_tokens);
    let therapist = base
        .clone()
        .with_system(THERAPIST_SYSTEM_PROMPT)
        .with_temperature(config.default_temperature);

    let summarizer = ContextSummarizer::new(base.clone())
        .with_temperature(config.session.summary_temperature)
        .with_max_words(config.session.summary_max_words);
    let store = Arc::new(SessionStore::new(summarizer, &config.session).with_events(events.clone()));

    let retriever = build_retriever(config, provider);
    let retrieval_backend = if config.retrieval.enabled {
        retriever.name().to_string()
    } else {
        "none".to_string()
    };

    let pipeline =
        Pipeline::cbt(therapist, retriever, config.retrieval.top_k).with_events(events.clone());
    let controller = SessionController::new(store, base, pipeline)
        .with_temperature(config.session.summary_temperature)
        .with_events(events.clone());

    info!(
        provider = %provider_name,
        model = %config.default_model,
        retrieval = %retrieval_backend,
        "Session services ready"
    );

    Services {
        controller: Arc::new(controller),
        events,
        provider_name: provider_name.to_string(),
        retrieval_backend,
    }
}
