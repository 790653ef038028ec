//! Event bus for chat session updates
//!
//! Views subscribe to re-render after each state transition. Built on a tokio
//! broadcast channel; publishing never blocks and slow subscribers lose the
//! oldest events.
//!
//! ```rust
//! use ollama_manager_chat::bus::{EventBus, SessionEvent};
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::new();
//! let mut subscriber = bus.subscribe();
//!
//! bus.publish(SessionEvent::TranscriptCleared);
//! assert_eq!(subscriber.recv().await.unwrap(), SessionEvent::TranscriptCleared);
//! # });
//! ```

use ollama_manager_config::SamplingConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{Role, SendOutcome, SendState};

const CHANNEL_CAPACITY: usize = 256;

/// Something a view may want to redraw for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    StateChanged(SendState),
    TurnAppended { role: Role },
    /// A fragment of the assistant reply
    Fragment(String),
    SendFinished(SendOutcome),
    TranscriptCleared,
    ModelChanged(Option<String>),
    SamplingChanged(SamplingConfig),
    SystemPromptChanged,
}

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Receiver for events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
