//! Daemon response fixtures for the workspace integration tests
//!
//! Bodies are built from the client's wire types so the tests and the client
//! agree on the format by construction.

use ollama_manager_client::{ChatChunk, ModelTag, PullEvent};
use serde_json::json;

/// `GET /api/tags` body listing `models` as `(name, size)` pairs
pub fn tags_body(models: &[(&str, u64)]) -> String {
    let models: Vec<ModelTag> = models
        .iter()
        .map(|(name, size)| ModelTag::new(*name, *size))
        .collect();
    json!({ "models": models }).to_string()
}

/// NDJSON body of a successful pull of the given `(digest, size)` layers
pub fn pull_body(layers: &[(&str, u64)]) -> String {
    let mut events = vec![PullEvent::status("pulling manifest")];
    for (digest, size) in layers {
        events.push(PullEvent::layer(*digest, 0, *size));
        events.push(PullEvent::layer(*digest, size / 2, *size));
        events.push(PullEvent::layer(*digest, *size, *size));
    }
    events.push(PullEvent::status("verifying sha256 digest"));
    events.push(PullEvent::status("writing manifest"));
    events.push(PullEvent::status("success"));
    ndjson(&events)
}

/// NDJSON body streaming `fragments` followed by the final event
pub fn chat_body(fragments: &[&str]) -> String {
    let mut chunks: Vec<ChatChunk> = fragments.iter().map(|f| ChatChunk::content(*f)).collect();
    chunks.push(ChatChunk::done());
    ndjson(&chunks)
}

/// `{"error": ...}` line as sent inside a stream or as an error body
pub fn error_line(message: &str) -> String {
    format!("{}\n", json!({ "error": message }))
}

/// One JSON document per line
pub fn ndjson<T: serde::Serialize>(items: &[T]) -> String {
    items
        .iter()
        .filter_map(|item| serde_json::to_string(item).ok())
        .map(|line| line + "\n")
        .collect()
}
