//! Error types for chat sessions

use ollama_manager_client::DaemonError;
use ollama_manager_config::ConfigError;
use ollama_manager_models::{ErrorKind, RegistryError};
use thiserror::Error;

/// Errors that can occur in a chat session
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChatError {
    #[error("A reply is still streaming; wait for it or cancel it first")]
    SessionBusy,

    #[error("No model selected")]
    NoModelSelected,

    #[error("Cannot reach the Ollama daemon: {0}")]
    UnreachableDaemon(String),

    #[error("Unexpected response from the Ollama daemon: {0}")]
    MalformedResponse(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::SessionBusy => ErrorKind::SessionBusy,
            ChatError::NoModelSelected => ErrorKind::NoModelSelected,
            ChatError::UnreachableDaemon(_) => ErrorKind::UnreachableDaemon,
            ChatError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::InvalidParameter(_) => ErrorKind::InvalidParameter,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<DaemonError> for ChatError {
    fn from(err: DaemonError) -> Self {
        match RegistryError::from(err) {
            RegistryError::UnreachableDaemon(message) => ChatError::UnreachableDaemon(message),
            RegistryError::NotFound(name) => ChatError::NotFound(name),
            RegistryError::InvalidParameter(message) => ChatError::InvalidParameter(message),
            other => ChatError::MalformedResponse(other.to_string()),
        }
    }
}

impl From<ConfigError> for ChatError {
    fn from(err: ConfigError) -> Self {
        ChatError::InvalidParameter(err.to_string())
    }
}
