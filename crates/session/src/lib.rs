//! # cbtsim Session
//!
//! Per-session state and the turn state machine.
//!
//! - [`SessionStore`]: the session registry. Every session sits behind its
//!   own mutex, so appends and summary refreshes on one session never
//!   interleave while different sessions proceed independently.
//! - [`ContextWindow`]: renders a session into the conversation context
//!   string every prompt receives.
//! - [`SessionController`]: ingress → classification → routing → reply.

pub mod context;
pub mod controller;
pub mod store;

pub use context::ContextWindow;
pub use controller::{SessionController, TurnError};
pub use store::SessionStore;
