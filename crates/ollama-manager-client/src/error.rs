//! Errors returned by daemon calls

use thiserror::Error;

/// Failures talking to the Ollama daemon
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DaemonError {
    /// Connection refused, reset or DNS failure
    #[error("Cannot reach Ollama at {url}: {message}")]
    Unreachable { url: String, message: String },

    /// No response (or no streamed event) within the configured timeout
    #[error("Request to Ollama timed out: {0}")]
    Timeout(String),

    /// Payload could not be decoded
    #[error("Malformed response from Ollama: {0}")]
    Malformed(String),

    /// The daemon does not know the requested model
    #[error("Model not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status other than 404
    #[error("Ollama returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// An `{"error": ...}` event inside a stream
    #[error("Ollama reported an error: {0}")]
    Remote(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DaemonError {
    /// True for failures worth retrying later (connection problems, timeouts
    /// and daemon-side 5xx errors)
    pub fn is_retryable(&self) -> bool {
        match self {
            DaemonError::Unreachable { .. } | DaemonError::Timeout(_) => true,
            DaemonError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DaemonError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        if err.is_timeout() {
            DaemonError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            DaemonError::Unreachable {
                url,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            DaemonError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            DaemonError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            DaemonError::Unreachable {
                url,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(err: serde_json::Error) -> Self {
        DaemonError::Malformed(err.to_string())
    }
}

impl From<ollama_manager_config::ConfigError> for DaemonError {
    fn from(err: ollama_manager_config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}
