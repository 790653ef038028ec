//! Wire types of the Ollama HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of `GET /api/tags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTag {
    /// Identifier including tag, e.g. `llama3:8b`
    pub name: String,
    #[serde(default)]
    pub model: String,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: ModelDetailsInfo,
}

impl ModelTag {
    /// Minimal tag, mostly useful for tests and fixtures
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        Self {
            model: name.clone(),
            name,
            modified_at: Utc::now(),
            size,
            digest: String::new(),
            details: ModelDetailsInfo::default(),
        }
    }
}

/// Family/format metadata attached to a model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDetailsInfo {
    pub parent_model: String,
    pub format: String,
    pub family: String,
    pub families: Option<Vec<String>>,
    pub parameter_size: String,
    pub quantization_level: String,
}

/// `GET /api/tags` body
#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Option<Vec<ModelTag>>,
}

/// One progress event of `POST /api/pull`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullEvent {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
}

impl PullEvent {
    /// Status-only event such as `pulling manifest` or `success`
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            digest: None,
            total: None,
            completed: None,
        }
    }

    /// Layer download progress
    pub fn layer(digest: impl Into<String>, completed: u64, total: u64) -> Self {
        let digest = digest.into();
        Self {
            status: format!("pulling {}", short_digest(&digest)),
            digest: Some(digest),
            total: Some(total),
            completed: Some(completed),
        }
    }

    /// True for the final event of a successful pull
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

fn short_digest(digest: &str) -> &str {
    let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
    hex.get(..12).unwrap_or(hex)
}

/// `POST /api/show` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowResponse {
    pub license: String,
    pub modelfile: String,
    pub parameters: String,
    pub template: String,
    pub system: String,
    pub details: ModelDetailsInfo,
    pub model_info: Option<serde_json::Map<String, serde_json::Value>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// A chat message as sent to and received from the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Sampling options understood by the daemon
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_tau: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

impl From<&ollama_manager_config::SamplingConfig> for ChatOptions {
    fn from(sampling: &ollama_manager_config::SamplingConfig) -> Self {
        Self {
            temperature: Some(sampling.temperature),
            top_p: Some(sampling.top_p),
            top_k: Some(sampling.top_k),
            mirostat_tau: Some(sampling.mirostat_tau),
            num_ctx: Some(sampling.context_window),
        }
    }
}

/// `POST /api/chat` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(default)]
    pub options: ChatOptions,
}

/// One streamed event of `POST /api/chat`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
}

impl ChatChunk {
    /// Intermediate event carrying a fragment of assistant text
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            message: Some(ChatMessage::new("assistant", text)),
            done: false,
            done_reason: None,
        }
    }

    /// Final event of a stream
    pub fn done() -> Self {
        Self {
            message: Some(ChatMessage::new("assistant", "")),
            done: true,
            done_reason: Some("stop".to_string()),
        }
    }

    /// Text carried by this event, empty when none
    pub fn text(&self) -> &str {
        self.message.as_ref().map(|m| m.content.as_str()).unwrap_or("")
    }
}

/// `GET /api/version` body
#[derive(Debug, Deserialize)]
pub(crate) struct VersionResponse {
    pub version: String,
}

/// `{"error": "..."}` bodies and stream events
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
