//! Configuration for Ollama Manager
//!
//! This crate owns everything the rest of the workspace treats as configuration:
//! the daemon host and timeouts, the default system prompt and model, and the
//! sampling parameters sent with each chat request. Values are loaded with the
//! usual precedence (defaults, global file, project file, environment) and can
//! be published process-wide through [`settings`].

pub mod config;
pub mod error;
pub mod sampling;
pub mod settings;

pub use config::{ManagerConfig, DEFAULT_HOST, DEFAULT_SYSTEM_PROMPT};
pub use error::ConfigError;
pub use sampling::{SamplingConfig, SamplingField, SamplingUpdate};
pub use settings::{settings, Settings};

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
