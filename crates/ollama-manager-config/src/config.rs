//! Manager configuration and precedence loading
//!
//! Configuration is assembled from, lowest priority first:
//! 1. Built-in defaults
//! 2. Global config file (~/.ollama-manager/config.yaml)
//! 3. Project config file (.ollama-manager/config.yaml)
//! 4. Environment variables
//!
//! Command-line flags are applied on top by the binary.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{error::ConfigError, sampling::SamplingConfig, Result};

/// Standard local endpoint of the Ollama daemon
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// System prompt used when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Your responsibility is to assist your user to the best of your ability. You must be helpful and direct in your communication.";

const CONFIG_DIR: &str = ".ollama-manager";
const CONFIG_FILE: &str = "config.yaml";

/// Top-level configuration for the manager and chat client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Base URL of the Ollama daemon
    pub host: String,
    /// Timeout for unary requests (list, show, delete) in seconds
    pub timeout_secs: u64,
    /// Timeout for establishing a connection in seconds
    pub connect_timeout_secs: u64,
    /// Maximum silence between two streamed events in seconds
    pub stream_idle_timeout_secs: u64,
    /// Retries for failed connection attempts
    pub max_retries: u32,
    /// Model selected by default in chat when installed
    pub default_model: String,
    /// System prompt prepended to every chat request
    pub system_prompt: String,
    /// Sampling defaults for new chat sessions
    pub sampling: SamplingConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
            stream_idle_timeout_secs: 300,
            max_retries: 3,
            default_model: "llama3:latest".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            sampling: SamplingConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration with full precedence and validate the result
    pub fn load_with_precedence() -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                debug!("Loading global config from {:?}", global);
                config.merge_from_file(&global)?;
            }
        }

        let project = Self::project_config_path();
        if project.exists() {
            debug!("Loading project config from {:?}", project);
            config.merge_from_file(&project)?;
        }

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Global configuration path (~/.ollama-manager/config.yaml)
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Project configuration path (.ollama-manager/config.yaml)
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Apply environment overrides
    pub fn load_from_env(&mut self) {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            debug!("Loading OLLAMA_HOST from environment: {}", host);
            self.host = normalize_host(&host);
        }

        if let Ok(model) = std::env::var("OLM_DEFAULT_MODEL") {
            debug!("Loading OLM_DEFAULT_MODEL from environment: {}", model);
            self.default_model = model;
        }

        if let Ok(prompt) = std::env::var("OLM_SYSTEM_PROMPT") {
            debug!("Loading OLM_SYSTEM_PROMPT from environment");
            self.system_prompt = prompt;
        }

        if let Ok(timeout_str) = std::env::var("OLM_TIMEOUT_SECS") {
            match timeout_str.parse::<u64>() {
                Ok(timeout) => {
                    debug!("Loading OLM_TIMEOUT_SECS from environment: {}", timeout);
                    self.timeout_secs = timeout;
                }
                Err(_) => warn!("Invalid OLM_TIMEOUT_SECS value: {}", timeout_str),
            }
        }
    }

    /// Merge values from a YAML file; fields absent from the file are kept
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let file: ConfigFile = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if let Some(ollama) = file.ollama {
            ollama.merge_into(self);
        }

        Ok(())
    }

    /// Write the configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let write_err = |e: std::io::Error| ConfigError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let file = ConfigFile {
            ollama: Some(FileSettings::from(self)),
        };
        let content = serde_yaml::to_string(&file).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        std::fs::write(path, content).map_err(write_err)?;
        debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_host(&self.host)?;

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.stream_idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "stream idle timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.default_model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default model cannot be empty".to_string(),
            ));
        }

        self.sampling.validate()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

/// Check that `host` is an absolute http(s) URL
pub fn validate_host(host: &str) -> Result<()> {
    if host.trim().is_empty() {
        return Err(ConfigError::InvalidHost {
            url: host.to_string(),
            reason: "host URL cannot be empty".to_string(),
        });
    }

    let url = Url::parse(host).map_err(|e| ConfigError::InvalidHost {
        url: host.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::InvalidHost {
                url: host.to_string(),
                reason: format!("unsupported scheme '{}', expected http or https", other),
            })
        }
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidHost {
            url: host.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(())
}

/// Accept the bare `host:port` form the daemon itself understands in
/// `OLLAMA_HOST` and strip trailing slashes.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") || host.is_empty() {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// YAML file layout
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    ollama: Option<FileSettings>,
}

/// Settings as they appear in a file; every field is optional
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connect_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_idle_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sampling: Option<SamplingConfig>,
}

impl FileSettings {
    fn merge_into(self, config: &mut ManagerConfig) {
        if let Some(host) = self.host {
            config.host = normalize_host(&host);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(connect_timeout_secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = connect_timeout_secs;
        }
        if let Some(idle) = self.stream_idle_timeout_secs {
            config.stream_idle_timeout_secs = idle;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(default_model) = self.default_model {
            config.default_model = default_model;
        }
        if let Some(system_prompt) = self.system_prompt {
            config.system_prompt = system_prompt;
        }
        if let Some(sampling) = self.sampling {
            config.sampling = sampling;
        }
    }
}

impl From<&ManagerConfig> for FileSettings {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            host: Some(config.host.clone()),
            timeout_secs: Some(config.timeout_secs),
            connect_timeout_secs: Some(config.connect_timeout_secs),
            stream_idle_timeout_secs: Some(config.stream_idle_timeout_secs),
            max_retries: Some(config.max_retries),
            default_model: Some(config.default_model.clone()),
            system_prompt: Some(config.system_prompt.clone()),
            sampling: Some(config.sampling),
        }
    }
}
