//! Pull job state

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use ollama_manager_client::PullEvent;
use serde::{Deserialize, Serialize};

/// Error message of a job stopped by the user
pub const CANCELLED: &str = "cancelled";

/// Lifecycle of a pull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStatus {
    Queued,
    Downloading,
    Verifying,
    Complete,
    Failed,
}

impl PullStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PullStatus::Complete | PullStatus::Failed)
    }
}

impl fmt::Display for PullStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PullStatus::Queued => "queued",
            PullStatus::Downloading => "downloading",
            PullStatus::Verifying => "verifying",
            PullStatus::Complete => "complete",
            PullStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct LayerProgress {
    completed: u64,
    total: u64,
}

/// Tracked download of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullJob {
    /// Normalised identifier being pulled
    pub identifier: String,
    pub status: PullStatus,
    /// Bytes downloaded across all layers
    pub completed: u64,
    /// Bytes to download across all layers seen so far
    pub total: u64,
    /// Last status line from the daemon
    pub last_status: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    layers: BTreeMap<String, LayerProgress>,
}

impl PullJob {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: PullStatus::Queued,
            completed: 0,
            total: 0,
            last_status: String::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            layers: BTreeMap::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fold one progress event into the job.
    ///
    /// The final `success` event only moves the job to `verifying`; the
    /// registry marks it complete once the model shows up in a fresh list.
    /// Events after a terminal state are ignored.
    pub fn apply(&mut self, event: &PullEvent) {
        if self.is_terminal() {
            return;
        }

        self.last_status = event.status.clone();

        if let Some(digest) = &event.digest {
            let layer = self.layers.entry(digest.clone()).or_default();
            if let Some(total) = event.total {
                layer.total = total;
            }
            if let Some(completed) = event.completed {
                layer.completed = completed;
            }
            self.completed = self.layers.values().map(|l| l.completed).sum();
            self.total = self.layers.values().map(|l| l.total).sum();
            self.status = PullStatus::Downloading;
            return;
        }

        // `pulling manifest` leaves the job queued until a layer shows up
        let status = event.status.as_str();
        if status.starts_with("verifying")
            || status.starts_with("writing")
            || status.starts_with("removing")
            || event.is_success()
        {
            self.status = PullStatus::Verifying;
        }
    }

    /// Mark the job complete; no-op when already terminal
    pub fn complete(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = PullStatus::Complete;
        self.completed = self.total;
        self.last_status = "success".to_string();
        self.finished_at = Some(Utc::now());
        true
    }

    /// Mark the job failed with `message`; no-op when already terminal
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = PullStatus::Failed;
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == PullStatus::Failed && self.error.as_deref() == Some(CANCELLED)
    }

    /// Downloaded fraction in `0.0..=1.0`, None before any layer size is known
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.completed as f64 / self.total as f64).min(1.0))
    }

    /// Download progress in percent (0-100)
    pub fn percentage(&self) -> f64 {
        self.fraction().map(|f| f * 100.0).unwrap_or(0.0)
    }

    /// Number of distinct layers seen
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
