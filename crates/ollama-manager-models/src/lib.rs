//! Model registry for a local Ollama daemon
//!
//! Keeps the snapshot of installed models and tracks pulls, updates and
//! deletes issued against the daemon.

pub mod error;
pub mod identifier;
pub mod job;
pub mod models;
pub mod query;
pub mod registry;

pub use error::{ErrorKind, RegistryError};
pub use identifier::{normalize_identifier, same_model};
pub use job::{PullJob, PullStatus};
pub use models::{DiskUsage, ModelDetails, ModelRecord, Snapshot};
pub use query::{ModelQuery, SortKey};
pub use registry::{ModelRegistry, PullHandle};

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
