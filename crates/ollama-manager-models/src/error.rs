//! Error taxonomy shared by the registry and chat sessions

use std::fmt;

use ollama_manager_client::DaemonError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failure, as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnreachableDaemon,
    MalformedResponse,
    NotFound,
    DuplicatePull,
    SessionBusy,
    InvalidParameter,
    NoModelSelected,
}

impl ErrorKind {
    /// Connection problems are worth retrying; everything else needs a
    /// different request
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::UnreachableDaemon)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnreachableDaemon => "unreachable daemon",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::NotFound => "not found",
            ErrorKind::DuplicatePull => "duplicate pull",
            ErrorKind::SessionBusy => "session busy",
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::NoModelSelected => "no model selected",
        };
        f.write_str(name)
    }
}

/// Errors from registry operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Cannot reach the Ollama daemon: {0}")]
    UnreachableDaemon(String),

    #[error("Unexpected response from the Ollama daemon: {0}")]
    MalformedResponse(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("A pull of {0} is already in progress")]
    DuplicatePull(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::UnreachableDaemon(_) => ErrorKind::UnreachableDaemon,
            RegistryError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::DuplicatePull(_) => ErrorKind::DuplicatePull,
            RegistryError::InvalidParameter(_) => ErrorKind::InvalidParameter,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Convert a daemon failure at the component boundary.
///
/// Timeouts and daemon-side 5xx answers count as an unreachable daemon; other
/// non-success statuses and stream errors are protocol mismatches.
impl From<DaemonError> for RegistryError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::NotFound(name) => RegistryError::NotFound(name),
            DaemonError::InvalidRequest(message) => RegistryError::InvalidParameter(message),
            err if err.is_retryable() => RegistryError::UnreachableDaemon(err.to_string()),
            err => RegistryError::MalformedResponse(err.to_string()),
        }
    }
}
