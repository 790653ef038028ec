//! Transcript and send-state types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Role name on the daemon's chat API
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Failure marker on an assistant reply that did not finish
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Where a session is in its current send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    #[default]
    Idle,
    AwaitingFirstToken,
    Streaming,
    Complete,
    Failed,
}

impl SendState {
    pub fn is_in_flight(self) -> bool {
        matches!(self, SendState::AwaitingFirstToken | SendState::Streaming)
    }
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendState::Idle => "idle",
            SendState::AwaitingFirstToken => "awaiting first token",
            SendState::Streaming => "streaming",
            SendState::Complete => "complete",
            SendState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How the last send ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SendOutcome {
    Complete,
    Failed(String),
    Cancelled,
}
