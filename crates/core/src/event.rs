//! Domain event system — decoupled observation of session activity.
//!
//! Events are published when something interesting happens in a session.
//! Other components (logging sinks, tests, dashboards) can subscribe
//! without coupling to the controller or the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::session::Classification;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A session was created lazily for a new session ID
    SessionCreated {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A message was appended to a session log
    MessageAppended {
        session_id: String,
        role: String,
        message_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The rolling summary was regenerated
    SummaryRefreshed {
        session_id: String,
        message_count: usize,
        /// True if the templated fallback summary was used
        fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// An incoming message was routed
    MessageClassified {
        session_id: String,
        classification: Classification,
        timestamp: DateTime<Utc>,
    },

    /// Retrieval ran ahead of the pipeline
    RetrievalCompleted {
        session_id: String,
        snippets: usize,
        /// True if the retriever failed and the turn continued without context
        degraded: bool,
        timestamp: DateTime<Utc>,
    },

    /// A pipeline stage produced its output
    StageCompleted {
        session_id: String,
        stage: String,
        timestamp: DateTime<Utc>,
    },

    /// A session reached its terminal state
    SessionEnded {
        session_id: String,
        message_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
