//! Chat session state machine
//!
//! A session holds the transcript, the selected model, the sampling
//! configuration and the system prompt. Each send moves through
//! `Idle -> AwaitingFirstToken -> Streaming -> Complete` (or `Failed`) and
//! settles back to `Idle`; only one send may be in flight at a time.

use std::sync::Arc;

use ollama_manager_client::{ChatMessage, ChatOptions, ChatRequest, Daemon};
use ollama_manager_config::{settings, ManagerConfig, SamplingConfig, SamplingUpdate};
use ollama_manager_models::{normalize_identifier, ModelRegistry};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    bus::{EventBus, SessionEvent},
    error::ChatError,
    models::{Role, SendOutcome, SendState, Turn},
    stream::ResponseStream,
    Result,
};

/// Failure marker of a reply stopped by the user
pub const CANCELLED: &str = "cancelled";

struct ActiveSend {
    id: u64,
    cancel: CancellationToken,
}

struct SessionState {
    turns: Vec<Turn>,
    model: Option<String>,
    sampling: SamplingConfig,
    system_prompt: String,
    state: SendState,
    last_outcome: Option<SendOutcome>,
    active: Option<ActiveSend>,
    next_send_id: u64,
}

impl SessionState {
    fn is_active(&self, send_id: u64) -> bool {
        self.active.as_ref().map(|a| a.id) == Some(send_id)
    }

    /// Assistant turn of the reply in progress, created on first use
    fn reply_turn(&mut self) -> (&mut Turn, bool) {
        let needs_turn = !matches!(
            self.turns.last(),
            Some(turn) if turn.role == Role::Assistant && self.state == SendState::Streaming
        );
        if needs_turn {
            self.turns.push(Turn::assistant(""));
        }
        let last = self.turns.len() - 1;
        (&mut self.turns[last], needs_turn)
    }
}

/// A single-user chat session against the daemon
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Mutex<SessionState>>,
    daemon: Arc<dyn Daemon>,
    registry: ModelRegistry,
    bus: EventBus,
}

impl ChatSession {
    /// Session using the system prompt from the process-wide settings and
    /// default sampling
    pub fn new(registry: ModelRegistry) -> Self {
        Self::build(registry, SamplingConfig::default(), settings().system_prompt())
    }

    /// Session using the sampling defaults and system prompt of `config`
    pub fn with_config(registry: ModelRegistry, config: &ManagerConfig) -> Self {
        Self::build(registry, config.sampling, config.system_prompt.clone())
    }

    fn build(registry: ModelRegistry, sampling: SamplingConfig, system_prompt: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                turns: Vec::new(),
                model: None,
                sampling,
                system_prompt,
                state: SendState::Idle,
                last_outcome: None,
                active: None,
                next_send_id: 0,
            })),
            daemon: registry.daemon(),
            registry,
            bus: EventBus::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Copy of the transcript
    pub fn transcript(&self) -> Vec<Turn> {
        self.inner.lock().turns.clone()
    }

    pub fn model(&self) -> Option<String> {
        self.inner.lock().model.clone()
    }

    pub fn sampling(&self) -> SamplingConfig {
        self.inner.lock().sampling
    }

    pub fn system_prompt(&self) -> String {
        self.inner.lock().system_prompt.clone()
    }

    pub fn state(&self) -> SendState {
        self.inner.lock().state
    }

    pub fn last_outcome(&self) -> Option<SendOutcome> {
        self.inner.lock().last_outcome.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    /// Events published after each state transition
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Send `message` and stream the reply.
    ///
    /// The user turn is appended immediately; the daemon request starts when
    /// the returned stream is first polled.
    pub fn send(&self, message: &str) -> Result<ResponseStream> {
        let (request, send_id, cancel) = {
            let mut state = self.inner.lock();

            if state.active.is_some() {
                warn!("Rejected send while a reply is in flight");
                return Err(ChatError::SessionBusy);
            }

            let model = state.model.clone().ok_or(ChatError::NoModelSelected)?;

            if message.trim().is_empty() {
                return Err(ChatError::InvalidParameter(
                    "message cannot be empty".to_string(),
                ));
            }

            state.turns.push(Turn::user(message));

            let mut messages = Vec::with_capacity(state.turns.len() + 1);
            if !state.system_prompt.trim().is_empty() {
                messages.push(ChatMessage::new(
                    Role::System.as_str(),
                    state.system_prompt.clone(),
                ));
            }
            messages.extend(
                state
                    .turns
                    .iter()
                    .filter(|turn| !turn.is_failed() && !turn.content.is_empty())
                    .map(|turn| ChatMessage::new(turn.role.as_str(), turn.content.clone())),
            );

            let request = ChatRequest {
                model,
                messages,
                stream: true,
                options: ChatOptions::from(&state.sampling),
            };

            state.next_send_id += 1;
            let send_id = state.next_send_id;
            let cancel = CancellationToken::new();
            state.active = Some(ActiveSend {
                id: send_id,
                cancel: cancel.clone(),
            });
            state.state = SendState::AwaitingFirstToken;

            (request, send_id, cancel)
        };

        debug!(
            "Sending {} messages to {}",
            request.messages.len(),
            request.model
        );
        self.bus.publish(SessionEvent::TurnAppended { role: Role::User });
        self.bus
            .publish(SessionEvent::StateChanged(SendState::AwaitingFirstToken));

        Ok(ResponseStream::new(
            self.clone(),
            self.daemon.clone(),
            send_id,
            request,
            cancel,
        ))
    }

    /// Empty the transcript; model, sampling and system prompt are kept
    pub fn clear(&self) -> Result<()> {
        {
            let mut state = self.inner.lock();
            if state.active.is_some() {
                return Err(ChatError::SessionBusy);
            }
            state.turns.clear();
        }
        debug!("Transcript cleared");
        self.bus.publish(SessionEvent::TranscriptCleared);
        Ok(())
    }

    /// Select `identifier`, which must be in the registry snapshot
    pub fn set_model(&self, identifier: &str) -> Result<String> {
        let normalized = normalize_identifier(identifier)
            .map_err(|e| ChatError::InvalidParameter(e.to_string()))?;
        let record = self
            .registry
            .find(&normalized)
            .ok_or(ChatError::NotFound(normalized))?;

        self.inner.lock().model = Some(record.name.clone());
        info!("Chat model set to {}", record.name);
        self.bus
            .publish(SessionEvent::ModelChanged(Some(record.name.clone())));
        Ok(record.name)
    }

    /// Select `preferred` when installed, otherwise the first installed
    /// model; the selection is left unchanged when nothing is installed
    pub fn select_default_model(&self, preferred: Option<&str>) -> Option<String> {
        let snapshot = self.registry.snapshot();
        let chosen = preferred
            .and_then(|p| snapshot.find(p))
            .or_else(|| snapshot.records.first())
            .map(|record| record.name.clone())?;

        self.inner.lock().model = Some(chosen.clone());
        debug!("Default chat model: {}", chosen);
        self.bus
            .publish(SessionEvent::ModelChanged(Some(chosen.clone())));
        Some(chosen)
    }

    /// Apply every field of `update` or none of them
    pub fn update_sampling_config(&self, update: &SamplingUpdate) -> Result<SamplingConfig> {
        let updated = {
            let mut state = self.inner.lock();
            let updated = state.sampling.apply(update).map_err(|e| {
                warn!("Rejected sampling update: {}", e);
                ChatError::from(e)
            })?;
            state.sampling = updated;
            updated
        };
        self.bus.publish(SessionEvent::SamplingChanged(updated));
        Ok(updated)
    }

    /// Replace the system prompt used from the next send on
    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        self.inner.lock().system_prompt = prompt.into();
        self.bus.publish(SessionEvent::SystemPromptChanged);
    }

    /// Cancel the send in flight; false when there is none
    pub fn cancel(&self) -> bool {
        let send_id = match &self.inner.lock().active {
            Some(active) => active.id,
            None => return false,
        };
        self.finish(send_id, SendOutcome::Cancelled)
    }

    pub(crate) fn append_fragment(&self, send_id: u64, text: &str) -> bool {
        let (appended_turn, first) = {
            let mut state = self.inner.lock();
            if !state.is_active(send_id) {
                return false;
            }
            let (turn, created) = state.reply_turn();
            turn.content.push_str(text);
            let first = state.state != SendState::Streaming;
            state.state = SendState::Streaming;
            (created, first)
        };

        if appended_turn {
            self.bus
                .publish(SessionEvent::TurnAppended { role: Role::Assistant });
        }
        if first {
            self.bus
                .publish(SessionEvent::StateChanged(SendState::Streaming));
        }
        self.bus.publish(SessionEvent::Fragment(text.to_string()));
        true
    }

    /// Settle the send `send_id`; no-op when it is no longer the active one
    pub(crate) fn finish(&self, send_id: u64, outcome: SendOutcome) -> bool {
        let (terminal, appended) = {
            let mut state = self.inner.lock();
            if !state.is_active(send_id) {
                return false;
            }
            let active = state.active.take();

            let marker = match &outcome {
                SendOutcome::Complete => None,
                SendOutcome::Failed(message) => Some(message.clone()),
                SendOutcome::Cancelled => Some(CANCELLED.to_string()),
            };

            let mut appended = false;
            if let Some(marker) = marker {
                let streaming = state.state == SendState::Streaming;
                // A failure before any fragment still gets a marked reply;
                // cancelling an unanswered send leaves no reply behind
                if streaming || matches!(outcome, SendOutcome::Failed(_)) {
                    let (turn, created) = state.reply_turn();
                    turn.error = Some(marker);
                    appended = created;
                }
            }

            let terminal = match outcome {
                SendOutcome::Complete => Some(SendState::Complete),
                SendOutcome::Failed(_) => Some(SendState::Failed),
                SendOutcome::Cancelled => None,
            };
            state.state = SendState::Idle;
            state.last_outcome = Some(outcome.clone());

            if let Some(active) = active {
                active.cancel.cancel();
            }
            (terminal, appended)
        };

        match &outcome {
            SendOutcome::Complete => debug!("Reply complete"),
            SendOutcome::Failed(message) => warn!("Reply failed: {}", message),
            SendOutcome::Cancelled => info!("Reply cancelled"),
        }

        if appended {
            self.bus.publish(SessionEvent::TurnAppended {
                role: Role::Assistant,
            });
        }
        if let Some(terminal) = terminal {
            self.bus.publish(SessionEvent::StateChanged(terminal));
        }
        self.bus.publish(SessionEvent::SendFinished(outcome));
        self.bus.publish(SessionEvent::StateChanged(SendState::Idle));
        true
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ChatSession")
            .field("model", &state.model)
            .field("turns", &state.turns.len())
            .field("state", &state.state)
            .finish()
    }
}
