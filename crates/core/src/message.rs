//! Message domain types.
//!
//! Messages are the immutable entries of a session's log:
//! user sends a message → controller appends it → a reply is generated → the
//! reply is appended. Once appended, a message is never edited or reordered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The client talking to the simulated therapist
    User,
    /// The simulated therapist
    Assistant,
}

impl Role {
    /// Title-cased label used when rendering transcripts ("User", "Assistant").
    pub fn title(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A single message in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Marks the terminal therapeutic summary of a session
    #[serde(default)]
    pub is_conclusion: bool,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            is_conclusion: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create the closing assistant message of a session.
    pub fn conclusion(content: impl Into<String>) -> Self {
        Self {
            is_conclusion: true,
            ..Self::assistant(content)
        }
    }

    /// Render as a transcript line: `Role: content`.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role.title(), self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("I can't sleep");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "I can't sleep");
        assert!(!msg.is_conclusion);
    }

    #[test]
    fn conclusion_is_flagged_assistant_message() {
        let msg = Message::conclusion("Thank you for today.");
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.is_conclusion);
    }

    #[test]
    fn transcript_line_uses_title_case_role() {
        assert_eq!(Message::user("Hi").transcript_line(), "User: Hi");
        assert_eq!(
            Message::assistant("Hello").transcript_line(),
            "Assistant: Hello"
        );
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert_eq!(" assistant ".parse::<Role>().unwrap(), Role::Assistant);
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert!(json.contains("\"assistant\""));
    }
}
