//! The daemon seam consumed by the registry and chat sessions

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    models::{ChatChunk, ChatRequest, ModelTag, PullEvent, ShowResponse},
    Result,
};

/// Progress events of a pull, in daemon order
pub type PullStream = BoxStream<'static, Result<PullEvent>>;

/// Streamed chat events, in daemon order
pub type ChatStream = BoxStream<'static, Result<ChatChunk>>;

/// Operations offered by the inference daemon.
///
/// Streams are finite and consumed once; dropping one closes the underlying
/// connection, which is how pulls and chat replies are cancelled.
#[async_trait]
pub trait Daemon: Send + Sync {
    /// Base URL requests are sent to
    fn base_url(&self) -> String;

    /// Installed models
    async fn list_models(&self) -> Result<Vec<ModelTag>>;

    /// Start downloading (or refreshing) a model
    async fn pull_model(&self, name: &str) -> Result<PullStream>;

    /// Remove an installed model
    async fn delete_model(&self, name: &str) -> Result<()>;

    /// Extended metadata of an installed model
    async fn show_model(&self, name: &str) -> Result<ShowResponse>;

    /// Start a streaming chat completion
    async fn chat(&self, request: ChatRequest) -> Result<ChatStream>;

    /// Daemon version string
    async fn version(&self) -> Result<String>;

    /// True when the daemon answers at all
    async fn health_check(&self) -> bool {
        self.version().await.is_ok()
    }
}
