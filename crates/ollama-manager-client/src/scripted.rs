//! In-memory [`Daemon`] with scripted responses
//!
//! Used by the registry and chat test suites to drive the state machines
//! without a running daemon. Streams can be scripted up front or fed live
//! through a channel to hold an operation in flight.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::{channel::mpsc, stream, StreamExt};
use parking_lot::Mutex;

use crate::{
    daemon::{ChatStream, Daemon, PullStream},
    error::DaemonError,
    models::{ChatChunk, ChatRequest, ModelTag, PullEvent, ShowResponse},
    Result,
};

enum PullScript {
    Events(Vec<Result<PullEvent>>),
    Live(mpsc::UnboundedReceiver<Result<PullEvent>>),
}

enum ChatScript {
    Chunks(Vec<Result<ChatChunk>>),
    Live(mpsc::UnboundedReceiver<Result<ChatChunk>>),
}

#[derive(Default)]
struct State {
    models: Vec<ModelTag>,
    pulls: HashMap<String, PullScript>,
    chats: VecDeque<ChatScript>,
    chat_requests: Vec<ChatRequest>,
    deleted: Vec<String>,
    pull_requests: Vec<String>,
    unreachable: bool,
    latency: Option<Duration>,
}

/// Scripted daemon
#[derive(Clone, Default)]
pub struct ScriptedDaemon {
    state: Arc<Mutex<State>>,
}

impl ScriptedDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Daemon with `models` installed
    pub fn with_models(models: Vec<ModelTag>) -> Self {
        let daemon = Self::new();
        daemon.state.lock().models = models;
        daemon
    }

    pub fn add_model(&self, model: ModelTag) {
        self.state.lock().models.push(model);
    }

    pub fn installed(&self) -> Vec<String> {
        self.state.lock().models.iter().map(|m| m.name.clone()).collect()
    }

    /// Make every call fail as if the daemon were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Script the events of the next pull of `name`. A `success` event
    /// installs the model (size taken from the largest `total` seen).
    pub fn script_pull(&self, name: &str, events: Vec<Result<PullEvent>>) {
        self.state
            .lock()
            .pulls
            .insert(name.to_string(), PullScript::Events(events));
    }

    /// Feed the next pull of `name` by hand
    pub fn pull_channel(&self, name: &str) -> mpsc::UnboundedSender<Result<PullEvent>> {
        let (tx, rx) = mpsc::unbounded();
        self.state
            .lock()
            .pulls
            .insert(name.to_string(), PullScript::Live(rx));
        tx
    }

    /// Queue the chunks of the next chat reply
    pub fn script_chat(&self, chunks: Vec<Result<ChatChunk>>) {
        self.state.lock().chats.push_back(ChatScript::Chunks(chunks));
    }

    /// Feed the next chat reply by hand
    pub fn chat_channel(&self) -> mpsc::UnboundedSender<Result<ChatChunk>> {
        let (tx, rx) = mpsc::unbounded();
        self.state.lock().chats.push_back(ChatScript::Live(rx));
        tx
    }

    /// Chat requests received so far
    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.state.lock().chat_requests.clone()
    }

    /// Names passed to `delete_model` that succeeded
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// Names passed to `pull_model`
    pub fn pull_requests(&self) -> Vec<String> {
        self.state.lock().pull_requests.clone()
    }

    /// Delay every `list_models` and `chat` call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = Some(latency);
    }

    async fn respond_slowly(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_reachable(&self) -> Result<()> {
        if self.state.lock().unreachable {
            return Err(DaemonError::Unreachable {
                url: self.base_url(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Daemon for ScriptedDaemon {
    fn base_url(&self) -> String {
        "http://scripted.invalid".to_string()
    }

    async fn list_models(&self) -> Result<Vec<ModelTag>> {
        self.respond_slowly().await;
        self.check_reachable()?;
        Ok(self.state.lock().models.clone())
    }

    async fn pull_model(&self, name: &str) -> Result<PullStream> {
        self.check_reachable()?;

        let script = {
            let mut state = self.state.lock();
            state.pull_requests.push(name.to_string());
            state.pulls.remove(name)
        };

        let events: PullStream = match script {
            Some(PullScript::Events(events)) => stream::iter(events).boxed(),
            Some(PullScript::Live(rx)) => rx.boxed(),
            None => stream::iter(vec![Err(DaemonError::Remote(
                "pull model manifest: file does not exist".to_string(),
            ))])
            .boxed(),
        };

        let state = self.state.clone();
        let name = name.to_string();
        let mut largest = 0u64;
        Ok(events
            .inspect(move |event| {
                if let Ok(event) = event {
                    largest = largest.max(event.total.unwrap_or(0));
                    if event.is_success() {
                        let mut state = state.lock();
                        state.models.retain(|m| m.name != name);
                        state.models.push(ModelTag::new(name.clone(), largest));
                    }
                }
            })
            .boxed())
    }

    async fn delete_model(&self, name: &str) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        let before = state.models.len();
        state.models.retain(|m| m.name != name);
        if state.models.len() == before {
            return Err(DaemonError::NotFound(name.to_string()));
        }
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn show_model(&self, name: &str) -> Result<ShowResponse> {
        self.check_reachable()?;
        let state = self.state.lock();
        let model = state
            .models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| DaemonError::NotFound(name.to_string()))?;

        Ok(ShowResponse {
            license: "MIT".to_string(),
            modelfile: format!("FROM {}", model.name),
            parameters: "stop \"<|eot_id|>\"".to_string(),
            details: model.details.clone(),
            modified_at: Some(model.modified_at),
            ..ShowResponse::default()
        })
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatStream> {
        self.respond_slowly().await;
        self.check_reachable()?;
        let script = {
            let mut state = self.state.lock();
            state.chat_requests.push(request);
            state.chats.pop_front()
        };

        Ok(match script {
            Some(ChatScript::Chunks(chunks)) => stream::iter(chunks).boxed(),
            Some(ChatScript::Live(rx)) => rx.boxed(),
            None => stream::iter(vec![Ok(ChatChunk::done())]).boxed(),
        })
    }

    async fn version(&self) -> Result<String> {
        self.check_reachable()?;
        Ok("0.0.0-scripted".to_string())
    }
}
