//! # cbtsim Core
//!
//! Domain types, traits, and error definitions for the cbtsim CBT session
//! simulator. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (text generation, knowledge retrieval) is
//! defined as a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, KnowledgeError, ProviderError, Result, SessionError};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{KnowledgeEntry, KnowledgeKind, KnowledgeQuery, KnowledgeStore};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use retrieval::{NoRetrieval, RetrievedSnippet, Retriever};
pub use session::{Classification, Session, TurnRequest, TurnResponse};
