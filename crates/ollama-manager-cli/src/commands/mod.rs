// Command implementations

pub mod chat;
pub mod config;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use ollama_manager_client::{Daemon, OllamaClient};
use ollama_manager_config::ManagerConfig;
use ollama_manager_models::ModelRegistry;

use crate::error::CliResult;

/// Trait for command handlers
#[async_trait]
pub trait Command: Send + Sync {
    /// Execute the command
    async fn execute(&self) -> CliResult<()>;
}

/// What every daemon-facing command needs
#[derive(Clone)]
pub struct AppContext {
    pub config: ManagerConfig,
    pub registry: ModelRegistry,
}

impl AppContext {
    /// Context talking to the daemon named by the process-wide settings
    pub fn from_settings(config: ManagerConfig) -> CliResult<Self> {
        let client = OllamaClient::from_settings()?;
        Ok(Self::with_daemon(config, Arc::new(client)))
    }

    pub fn with_daemon(config: ManagerConfig, daemon: Arc<dyn Daemon>) -> Self {
        Self {
            config,
            registry: ModelRegistry::new(daemon),
        }
    }
}
