//! Session domain types.
//!
//! A [`Session`] is one continuous client interaction keyed by an opaque ID.
//! It owns an append-only message log, a rolling summary, and the `ended`
//! flag that makes it terminal. [`Classification`] is the per-turn routing
//! category; [`TurnRequest`] / [`TurnResponse`] are the turn-processing
//! entry point consumed by transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::message::Message;

/// Per-session conversational state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier
    pub id: String,

    /// Ordered, append-only message log
    messages: Vec<Message>,

    /// Rolling summary; empty until the first refresh
    #[serde(default)]
    pub summary: String,

    /// Number of messages ever appended
    pub message_count: usize,

    pub created_at: DateTime<Utc>,

    pub last_updated: DateTime<Utc>,

    /// Terminal flag: once set, no further therapeutic processing
    #[serde(default)]
    pub ended: bool,
}

impl Session {
    /// Create an empty, active session.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            summary: String::new(),
            message_count: 0,
            created_at: now,
            last_updated: now,
            ended: false,
        }
    }

    /// Append a message and return the new message count.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.message_count += 1;
        self.last_updated = Utc::now();
        self.message_count
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `n` messages (fewer if the log is shorter).
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Completed user/assistant exchanges so far.
    pub fn exchanges(&self) -> usize {
        self.messages.len() / 2
    }

    /// Replace the rolling summary.
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
        self.last_updated = Utc::now();
    }

    /// Move the session to its terminal state.
    pub fn mark_ended(&mut self) {
        self.ended = true;
        self.last_updated = Utc::now();
    }

    /// Reject the call if the session has already ended.
    pub fn ensure_active(&self) -> Result<(), SessionError> {
        if self.ended {
            return Err(SessionError::Ended {
                session_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// The conclusion message, if the session has one.
    pub fn conclusion(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_conclusion)
    }
}

/// The routing category assigned to an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Greeting,
    Procedural,
    SessionEnd,
    Therapeutic,
    SmallTalk,
}

impl Classification {
    /// Every category, in taxonomy order.
    pub const ALL: [Classification; 5] = [
        Classification::Greeting,
        Classification::Procedural,
        Classification::SessionEnd,
        Classification::Therapeutic,
        Classification::SmallTalk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Greeting => "GREETING",
            Classification::Procedural => "PROCEDURAL",
            Classification::SessionEnd => "SESSION_END",
            Classification::Therapeutic => "THERAPEUTIC",
            Classification::SmallTalk => "SMALL_TALK",
        }
    }

    /// Parse model output strictly: trimmed, case-folded, must name exactly
    /// one category. Surrounding quotes and a trailing period are tolerated.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
            .trim()
            .to_ascii_uppercase()
            .replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }

    /// Parse model output, resolving anything unrecognised to `Therapeutic`.
    pub fn parse_or_therapeutic(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Classification::Therapeutic)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: String,
    /// Explicit request to conclude the session
    #[serde(default)]
    pub end_session: bool,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            end_session: false,
        }
    }

    /// Mark the turn as an explicit end-of-session request.
    pub fn ending(mut self) -> Self {
        self.end_session = true;
        self
    }

    /// Boundary validation: a session ID is always required, and a message
    /// is required unless the caller is explicitly ending the session.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.session_id.trim().is_empty() {
            return Err(SessionError::InvalidRequest("session_id must not be empty".into()));
        }
        if self.message.trim().is_empty() && !self.end_session {
            return Err(SessionError::InvalidRequest("message must not be empty".into()));
        }
        Ok(())
    }
}

/// The reply to a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub response: String,
    pub session_id: String,
    #[serde(default)]
    pub is_session_ended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order_and_counts() {
        let mut session = Session::new("s1");
        assert_eq!(session.append(Message::user("one")), 1);
        assert_eq!(session.append(Message::assistant("two")), 2);
        assert_eq!(session.append(Message::user("three")), 3);

        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(session.exchanges(), 1);
    }

    #[test]
    fn recent_returns_tail() {
        let mut session = Session::new("s1");
        for i in 0..7 {
            session.append(Message::user(format!("m{i}")));
        }
        let tail: Vec<&str> = session.recent(4).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(tail, vec!["m3", "m4", "m5", "m6"]);
        assert_eq!(session.recent(20).len(), 7);
    }

    #[test]
    fn ended_session_rejects() {
        let mut session = Session::new("s1");
        assert!(session.ensure_active().is_ok());
        session.mark_ended();
        assert_eq!(
            session.ensure_active(),
            Err(SessionError::Ended { session_id: "s1".into() })
        );
    }

    #[test]
    fn classification_parses_normalized_output() {
        assert_eq!(Classification::parse("GREETING"), Some(Classification::Greeting));
        assert_eq!(Classification::parse("  small_talk\n"), Some(Classification::SmallTalk));
        assert_eq!(Classification::parse("\"Session End\"."), Some(Classification::SessionEnd));
        assert_eq!(Classification::parse("procedural"), Some(Classification::Procedural));
    }

    #[test]
    fn classification_defaults_to_therapeutic() {
        for raw in ["", "   ", "I think this is a GREETING", "UNKNOWN", "🙂", "GREETING, SMALL_TALK"] {
            assert_eq!(Classification::parse_or_therapeutic(raw), Classification::Therapeutic);
        }
    }

    #[test]
    fn turn_request_defaults_and_validation() {
        let req: TurnRequest = serde_json::from_str(r#"{"message":"Hi","session_id":"s1"}"#).unwrap();
        assert!(!req.end_session);
        assert!(req.validate().is_ok());

        assert!(TurnRequest::new("", "Hi").validate().is_err());
        assert!(TurnRequest::new("s1", "  ").validate().is_err());
        assert!(TurnRequest::new("s1", "").ending().validate().is_ok());
    }
}
