//! Ollama daemon client
//!
//! The rest of the workspace talks to the inference daemon only through the
//! [`Daemon`] trait. [`OllamaClient`] implements it over the daemon's HTTP/JSON
//! contract, decoding streamed NDJSON responses into typed events.

pub mod client;
pub mod daemon;
pub mod error;
pub mod models;
pub mod ndjson;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use client::OllamaClient;
pub use daemon::{ChatStream, Daemon, PullStream};
pub use error::DaemonError;
pub use models::{
    ChatChunk, ChatMessage, ChatOptions, ChatRequest, ModelDetailsInfo, ModelTag, PullEvent,
    ShowResponse,
};
pub use retry::RetryPolicy;

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
