//! Process-wide settings
//!
//! The daemon host and the system prompt are user-settable at runtime and
//! shared by every view in the process. They live here behind an explicit
//! handle instead of ambient globals: call [`Settings::init`] once at startup
//! and read or update through [`settings()`].

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::info;

use crate::{
    config::{normalize_host, validate_host, ManagerConfig},
    Result,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Shared, runtime-mutable configuration
#[derive(Debug)]
pub struct Settings {
    inner: RwLock<ManagerConfig>,
}

/// The process-wide settings; initialised with defaults on first use
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| Settings::new(ManagerConfig::default()))
}

impl Settings {
    /// Create a standalone settings handle
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    /// Install `config` as the process-wide configuration.
    ///
    /// The configuration is validated first. Calling this again replaces the
    /// previous values.
    pub fn init(config: ManagerConfig) -> Result<&'static Settings> {
        config.validate()?;
        let settings = settings();
        settings.replace(config);
        Ok(settings)
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> ManagerConfig {
        self.inner.read().clone()
    }

    /// Replace the whole configuration
    pub fn replace(&self, config: ManagerConfig) {
        *self.inner.write() = config;
    }

    /// Current daemon host URL
    pub fn host(&self) -> String {
        self.inner.read().host.clone()
    }

    /// Change the daemon host; the previous value is kept on error
    pub fn set_host(&self, host: &str) -> Result<()> {
        let host = normalize_host(host);
        validate_host(&host)?;
        info!("Ollama host set to {}", host);
        self.inner.write().host = host;
        Ok(())
    }

    /// Current default system prompt
    pub fn system_prompt(&self) -> String {
        self.inner.read().system_prompt.clone()
    }

    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        self.inner.write().system_prompt = prompt.into();
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}
