//! The session registry: message store plus rolling summaries.
//!
//! Sessions live in memory for the lifetime of the process and are only
//! removed by [`SessionStore::clear`]. The registry map is guarded by an
//! `RwLock`; each session by its own `Mutex`. Callers that need several
//! operations to happen atomically (the turn controller) lock a session once
//! via [`SessionStore::lock`] and use the `*_locked` methods.

use cbtsim_agent::ContextSummarizer;
use cbtsim_config::SessionConfig;
use cbtsim_core::error::SessionError;
use cbtsim_core::event::{DomainEvent, EventBus};
use cbtsim_core::message::{Message, Role};
use cbtsim_core::session::Session;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::context::ContextWindow;

pub type SessionHandle = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    summarizer: ContextSummarizer,
    window: ContextWindow,
    summary_interval: usize,
    events: Option<Arc<EventBus>>,
}

impl SessionStore {
    pub fn new(summarizer: ContextSummarizer, config: &SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            summarizer,
            window: ContextWindow::new(config.full_history_limit, config.recent_window),
            summary_interval: config.summary_interval.max(1),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn window(&self) -> ContextWindow {
        self.window
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Get the session for `session_id`, creating it if needed.
    pub async fn handle(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have created it between the two locks.
        if let Some(handle) = sessions.get(session_id) {
            return handle.clone();
        }

        let handle = Arc::new(Mutex::new(Session::new(session_id)));
        sessions.insert(session_id.to_string(), handle.clone());
        drop(sessions);

        info!(%session_id, "Session created");
        self.publish(DomainEvent::SessionCreated {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        });
        handle
    }

    /// Lock the session for `session_id`, creating it if needed.
    ///
    /// A session cleared while we waited for its lock is stale; the guard is
    /// dropped and the current entry locked instead.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<Session> {
        loop {
            let handle = self.handle(session_id).await;
            let guard = handle.clone().lock_owned().await;
            let current = self
                .sessions
                .read()
                .await
                .get(session_id)
                .is_some_and(|h| Arc::ptr_eq(h, &handle));
            if current {
                return guard;
            }
            debug!(%session_id, "Session cleared while waiting for its lock, retrying");
        }
    }

    /// Append a message, refreshing the summary when the count hits the interval.
    pub async fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<usize, SessionError> {
        let mut session = self.lock(session_id).await;
        self.append_locked(&mut session, Message::new(role, content)).await
    }

    /// Append to an already-locked session. Rejects ended sessions.
    pub async fn append_locked(&self, session: &mut Session, message: Message) -> Result<usize, SessionError> {
        session.ensure_active()?;

        let role = message.role;
        let count = session.append(message);
        debug!(session_id = %session.id, %role, message_count = count, "Message appended");
        self.publish(DomainEvent::MessageAppended {
            session_id: session.id.clone(),
            role: role.to_string(),
            message_count: count,
            timestamp: Utc::now(),
        });

        if count % self.summary_interval == 0 {
            self.refresh_summary_locked(session).await;
        }
        Ok(count)
    }

    /// Regenerate the summary from the entire log.
    pub async fn refresh_summary_locked(&self, session: &mut Session) {
        let summary = self.summarizer.summarize(session.messages()).await;
        session.set_summary(summary.text);
        info!(
            session_id = %session.id,
            message_count = session.message_count,
            fallback = summary.fallback,
            "Summary refreshed"
        );
        self.publish(DomainEvent::SummaryRefreshed {
            session_id: session.id.clone(),
            message_count: session.message_count,
            fallback: summary.fallback,
            timestamp: Utc::now(),
        });
    }

    pub fn render_locked(&self, session: &Session) -> String {
        self.window.render(session)
    }

    /// The conversation context for `session_id`.
    pub async fn get_conversation_context(&self, session_id: &str) -> String {
        let session = self.lock(session_id).await;
        self.render_locked(&session)
    }

    /// Remove a session. The next message with the same id starts fresh.
    pub async fn clear(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(%session_id, "Session cleared");
        }
        removed
    }

    /// A copy of the session as it is now, without creating one.
    pub async fn snapshot(&self, session_id: &str) -> Option<Session> {
        let handle = self.sessions.read().await.get(session_id).cloned()?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
