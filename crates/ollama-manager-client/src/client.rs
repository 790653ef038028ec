//! HTTP implementation of [`Daemon`] for the Ollama API
//!
//! Implements the timeout and retry policy of the manager:
//! - connect timeout for every request, total timeout for unary requests
//! - idle timeout between events for streamed requests (pulls can run for a
//!   long time, so there is no total timeout)
//! - exponential backoff on connection failures; idempotent requests are also
//!   retried on timeouts and 5xx answers

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use ollama_manager_config::{settings, ManagerConfig, DEFAULT_HOST};

use crate::{
    daemon::{ChatStream, Daemon, PullStream},
    error::DaemonError,
    models::{ChatRequest, ErrorBody, ModelTag, ShowResponse, TagsResponse, VersionResponse},
    ndjson,
    retry::{execute_with_retry, RetryPolicy},
    Result,
};

const DEFAULT_POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 60;
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Where the base URL comes from
#[derive(Debug, Clone)]
enum HostSource {
    Fixed(String),
    /// Follow the process-wide settings, so a host change applies to the
    /// next request without rebuilding the client
    Settings,
}

/// Body for requests addressing one model
#[derive(Debug, Serialize)]
struct ModelBody<'a> {
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct PullBody<'a> {
    model: &'a str,
    stream: bool,
}

/// Ollama daemon client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Arc<Client>,
    host: HostSource,
    timeout: Duration,
    idle_timeout: Duration,
    max_retries: u32,
}

impl OllamaClient {
    /// Client for `base_url` with default timeouts
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let config = ManagerConfig {
            host: base_url.into(),
            ..ManagerConfig::default()
        };
        Self::from_config(&config)
    }

    /// Client for the standard local endpoint
    pub fn with_default_endpoint() -> Result<Self> {
        Self::new(DEFAULT_HOST)
    }

    /// Client using the host and timeouts of `config`
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        ollama_manager_config::config::validate_host(&config.host)?;
        let host = config.host.trim_end_matches('/').to_string();
        Self::build(HostSource::Fixed(host), config)
    }

    /// Client whose host follows [`settings()`]; timeouts are read once
    pub fn from_settings() -> Result<Self> {
        let config = settings().snapshot();
        Self::build(HostSource::Settings, &config)
    }

    fn build(host: HostSource, config: &ManagerConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(DEFAULT_TCP_KEEPALIVE_SECS))
            .build()
            .map_err(|e| DaemonError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            host,
            timeout: config.timeout(),
            idle_timeout: config.stream_idle_timeout(),
            max_retries: config.max_retries,
        })
    }

    /// Timeout applied to unary requests
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum silence tolerated between streamed events
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    fn require_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(DaemonError::InvalidRequest(
                "Model name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Turn a non-success response into the matching error
    async fn check_status(response: Response, subject: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            debug!("Daemon reported {} as not found: {}", subject, message);
            return Err(DaemonError::NotFound(subject.to_string()));
        }

        error!("Daemon error for {} ({}): {}", subject, status, message);
        Err(DaemonError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_stream<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        subject: &str,
    ) -> Result<Response> {
        let url = self.url(path);
        let client = self.client.clone();

        let response = execute_with_retry(RetryPolicy::connect_only(self.max_retries), || {
            client.post(&url).json(body).send()
        })
        .await
        .map_err(|e| {
            error!("Streaming request to {} failed: {}", url, e);
            DaemonError::from(e)
        })?;

        Self::check_status(response, subject).await
    }
}

#[async_trait]
impl Daemon for OllamaClient {
    fn base_url(&self) -> String {
        match &self.host {
            HostSource::Fixed(url) => url.clone(),
            HostSource::Settings => settings().host().trim_end_matches('/').to_string(),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelTag>> {
        debug!("Listing models");
        let url = self.url("/api/tags");
        let client = self.client.clone();
        let timeout = self.timeout;

        let response = execute_with_retry(RetryPolicy::idempotent(self.max_retries), || {
            client.get(&url).timeout(timeout).send()
        })
        .await
        .map_err(|e| {
            error!("Failed to list models at {}: {}", url, e);
            DaemonError::from(e)
        })?;

        let response = Self::check_status(response, "model list").await?;
        let body = response.text().await?;
        let tags: TagsResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse tags response: {}", e);
            DaemonError::Malformed(e.to_string())
        })?;

        let models = tags.models.unwrap_or_default();
        debug!("Listed {} models", models.len());
        Ok(models)
    }

    async fn pull_model(&self, name: &str) -> Result<PullStream> {
        Self::require_name(name)?;
        info!("Pulling model: {}", name);

        let body = PullBody {
            model: name,
            stream: true,
        };
        let response = self.post_stream("/api/pull", &body, name).await?;
        Ok(ndjson::decode(Box::pin(response.bytes_stream()), self.idle_timeout))
    }

    async fn delete_model(&self, name: &str) -> Result<()> {
        Self::require_name(name)?;
        debug!("Deleting model: {}", name);

        let url = self.url("/api/delete");
        let client = self.client.clone();
        let timeout = self.timeout;
        let body = ModelBody { model: name };

        let response = execute_with_retry(RetryPolicy::connect_only(self.max_retries), || {
            client.delete(&url).json(&body).timeout(timeout).send()
        })
        .await
        .map_err(|e| {
            error!("Failed to delete model {}: {}", name, e);
            DaemonError::from(e)
        })?;

        Self::check_status(response, name).await?;
        info!("Deleted model: {}", name);
        Ok(())
    }

    async fn show_model(&self, name: &str) -> Result<ShowResponse> {
        Self::require_name(name)?;
        debug!("Showing model: {}", name);

        let url = self.url("/api/show");
        let client = self.client.clone();
        let timeout = self.timeout;
        let body = ModelBody { model: name };

        let response = execute_with_retry(RetryPolicy::idempotent(self.max_retries), || {
            client.post(&url).json(&body).timeout(timeout).send()
        })
        .await
        .map_err(|e| {
            error!("Failed to show model {}: {}", name, e);
            DaemonError::from(e)
        })?;

        let response = Self::check_status(response, name).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse show response for {}: {}", name, e);
            DaemonError::Malformed(e.to_string())
        })
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatStream> {
        Self::require_name(&request.model)?;
        debug!(
            "Starting chat with {} ({} messages)",
            request.model,
            request.messages.len()
        );

        let response = self
            .post_stream("/api/chat", &request, &request.model)
            .await?;
        Ok(ndjson::decode(Box::pin(response.bytes_stream()), self.idle_timeout))
    }

    async fn version(&self) -> Result<String> {
        let url = self.url("/api/version");
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await?;
        let response = Self::check_status(response, "version").await?;
        let version: VersionResponse = response.json().await?;
        Ok(version.version)
    }

    async fn health_check(&self) -> bool {
        match self.version().await {
            Ok(version) => {
                debug!("Ollama {} is reachable at {}", version, self.base_url());
                true
            }
            Err(e) => {
                warn!("Ollama health check failed at {}: {}", self.base_url(), e);
                false
            }
        }
    }
}
