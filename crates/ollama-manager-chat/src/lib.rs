//! Chat sessions for a local Ollama daemon
//!
//! A [`ChatSession`] keeps the transcript, the selected model, the sampling
//! configuration and the system prompt, and streams replies through a
//! [`ResponseStream`]. Views follow the session through its [`bus`].

pub mod bus;
pub mod error;
pub mod models;
pub mod session;
pub mod stream;

pub use bus::{EventBus, SessionEvent};
pub use error::ChatError;
pub use models::{Role, SendOutcome, SendState, Turn};
pub use session::ChatSession;
pub use stream::ResponseStream;

/// Result type for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;
