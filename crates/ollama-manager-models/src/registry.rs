//! Model registry: the installed-model snapshot and the pull job table
//!
//! The snapshot is only as fresh as the last [`ModelRegistry::list`]; it is
//! swapped as a whole so readers never observe a half-updated list. Each pull
//! runs in its own task and publishes its [`PullJob`] through a watch channel.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ollama_manager_client::{scripted::ScriptedDaemon, ModelTag};
//! use ollama_manager_models::ModelRegistry;
//!
//! # tokio_test::block_on(async {
//! let daemon = ScriptedDaemon::with_models(vec![ModelTag::new("llama3:8b", 4_700_000_000)]);
//! let registry = ModelRegistry::new(Arc::new(daemon));
//!
//! registry.list().await.unwrap();
//! assert!(registry.find("llama3:8b").is_some());
//! assert!(registry.find("llama3").is_none());
//! # });
//! ```

use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use ollama_manager_client::{Daemon, DaemonError};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::RegistryError,
    identifier::normalize_identifier,
    job::{PullJob, CANCELLED},
    models::{DiskUsage, ModelDetails, ModelRecord, Snapshot},
    query::ModelQuery,
    Result,
};

/// Shared state of one pull: the published job and its cancellation switch
#[derive(Clone)]
struct JobEntry {
    state: Arc<watch::Sender<PullJob>>,
    cancel: CancellationToken,
    // Set once the daemon reported success; the pull can no longer be cancelled
    settled: Arc<Mutex<bool>>,
}

impl JobEntry {
    fn new(identifier: &str) -> Self {
        let (state, _) = watch::channel(PullJob::new(identifier));
        Self {
            state: Arc::new(state),
            cancel: CancellationToken::new(),
            settled: Arc::new(Mutex::new(false)),
        }
    }

    fn job(&self) -> PullJob {
        self.state.borrow().clone()
    }

    fn is_terminal(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Stop accepting cancellation; false when the job was cancelled first
    fn settle(&self) -> bool {
        let mut settled = self.settled.lock();
        if self.is_terminal() {
            return false;
        }
        *settled = true;
        true
    }

    fn fail(&self, message: String) {
        self.state.send_if_modified(|job| job.fail(message));
    }

    /// Fail the job as cancelled and stop its task; false when already
    /// terminal or settled
    fn cancel(&self) -> bool {
        let settled = self.settled.lock();
        if *settled {
            return false;
        }
        let cancelled = self.state.send_if_modified(|job| job.fail(CANCELLED));
        self.cancel.cancel();
        cancelled
    }
}

/// Handle on a running or finished pull
#[derive(Clone)]
pub struct PullHandle {
    identifier: String,
    entry: JobEntry,
    receiver: watch::Receiver<PullJob>,
}

impl PullHandle {
    /// Normalised identifier being pulled
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Current job state
    pub fn job(&self) -> PullJob {
        self.receiver.borrow().clone()
    }

    /// Receiver notified on every job update
    pub fn subscribe(&self) -> watch::Receiver<PullJob> {
        self.entry.state.subscribe()
    }

    /// Wait for the next update; None once the job can no longer change
    pub async fn changed(&mut self) -> Option<PullJob> {
        if self.receiver.borrow().is_terminal() {
            return None;
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the job reaches `complete` or `failed`
    pub async fn wait(&self) -> PullJob {
        let mut receiver = self.receiver.clone();
        loop {
            {
                let job = receiver.borrow_and_update();
                if job.is_terminal() {
                    return job.clone();
                }
            }
            if receiver.changed().await.is_err() {
                return receiver.borrow().clone();
            }
        }
    }

    /// Cancel the pull; idempotent, false when it had already finished or the
    /// daemon already reported success
    pub fn cancel(&self) -> bool {
        let cancelled = self.entry.cancel();
        if cancelled {
            info!("Cancelled pull of {}", self.identifier);
        }
        cancelled
    }
}

impl std::fmt::Debug for PullHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullHandle")
            .field("identifier", &self.identifier)
            .field("job", &*self.receiver.borrow())
            .finish()
    }
}

/// Installed models and pull jobs for one daemon
#[derive(Clone)]
pub struct ModelRegistry {
    daemon: Arc<dyn Daemon>,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
}

impl ModelRegistry {
    pub fn new(daemon: Arc<dyn Daemon>) -> Self {
        Self {
            daemon,
            snapshot: Arc::new(RwLock::new(Arc::new(Snapshot::default()))),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The daemon this registry talks to
    pub fn daemon(&self) -> Arc<dyn Daemon> {
        self.daemon.clone()
    }

    /// Query the daemon and replace the snapshot.
    ///
    /// On failure the previous snapshot is kept.
    pub async fn list(&self) -> Result<Vec<ModelRecord>> {
        let tags = self.daemon.list_models().await.map_err(|e| {
            warn!("Failed to list models: {}", e);
            RegistryError::from(e)
        })?;

        let records: Vec<ModelRecord> = tags.into_iter().map(ModelRecord::from).collect();
        debug!("Registry snapshot refreshed with {} models", records.len());

        *self.snapshot.write() = Arc::new(Snapshot::new(records.clone()));
        Ok(records)
    }

    /// Current snapshot; cheap to clone and never partially updated
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Record for `identifier` in the current snapshot
    pub fn find(&self, identifier: &str) -> Option<ModelRecord> {
        self.snapshot().find(identifier).cloned()
    }

    fn require(&self, identifier: &str) -> Result<ModelRecord> {
        let normalized = normalize_identifier(identifier)?;
        self.find(&normalized)
            .ok_or(RegistryError::NotFound(normalized))
    }

    /// Start downloading `identifier`.
    ///
    /// Rejected with `DuplicatePull` while a pull of the same model is still
    /// running; a finished job is replaced.
    pub fn pull(&self, identifier: &str) -> Result<PullHandle> {
        let identifier = normalize_identifier(identifier)?;

        let entry = {
            let mut jobs = self.jobs.lock();
            if let Some(existing) = jobs.get(&identifier) {
                if !existing.is_terminal() {
                    warn!("Rejected duplicate pull of {}", identifier);
                    return Err(RegistryError::DuplicatePull(identifier));
                }
            }
            let entry = JobEntry::new(&identifier);
            jobs.insert(identifier.clone(), entry.clone());
            entry
        };

        info!("Queued pull of {}", identifier);
        let handle = PullHandle {
            identifier: identifier.clone(),
            receiver: entry.state.subscribe(),
            entry: entry.clone(),
        };

        tokio::spawn(self.clone().run_pull(identifier, entry));
        Ok(handle)
    }

    /// Re-pull an installed model to pick up a newer version
    pub fn update(&self, identifier: &str) -> Result<PullHandle> {
        let record = self.require(identifier)?;
        debug!("Updating {}", record.name);
        self.pull(&record.name)
    }

    /// Cancel the pull of `identifier`; Ok(false) when it had already finished
    pub fn cancel_pull(&self, identifier: &str) -> Result<bool> {
        let identifier = normalize_identifier(identifier)?;
        let entry = self
            .jobs
            .lock()
            .get(&identifier)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(identifier.clone()))?;

        let cancelled = entry.cancel();
        if cancelled {
            info!("Cancelled pull of {}", identifier);
        }
        Ok(cancelled)
    }

    /// All pull jobs, oldest first
    pub fn jobs(&self) -> Vec<PullJob> {
        let mut jobs: Vec<PullJob> = self.jobs.lock().values().map(JobEntry::job).collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        jobs
    }

    pub fn job(&self, identifier: &str) -> Option<PullJob> {
        let identifier = normalize_identifier(identifier).ok()?;
        self.jobs.lock().get(&identifier).map(JobEntry::job)
    }

    /// Delete an installed model.
    ///
    /// `NotFound` when absent from the last snapshot; the record leaves the
    /// snapshot only once the daemon confirms.
    pub async fn delete(&self, identifier: &str) -> Result<()> {
        let record = self.require(identifier)?;

        self.daemon.delete_model(&record.name).await.map_err(|e| {
            warn!("Failed to delete {}: {}", record.name, e);
            RegistryError::from(e)
        })?;

        let mut snapshot = self.snapshot.write();
        let updated = snapshot.without(&record.name);
        *snapshot = Arc::new(updated);

        info!("Deleted model {}", record.name);
        Ok(())
    }

    /// Extended metadata for an installed model
    pub async fn details(&self, identifier: &str) -> Result<ModelDetails> {
        let record = self.require(identifier)?;

        let show = self.daemon.show_model(&record.name).await.map_err(|e| {
            warn!("Failed to show {}: {}", record.name, e);
            RegistryError::from(e)
        })?;

        Ok(ModelDetails::new(record, show))
    }

    /// Snapshot records filtered and sorted by `query`
    pub fn query(&self, query: &ModelQuery) -> Vec<ModelRecord> {
        query.apply(&self.snapshot().records)
    }

    pub fn disk_usage(&self) -> DiskUsage {
        self.snapshot().disk_usage()
    }

    async fn run_pull(self, identifier: String, entry: JobEntry) {
        let started = tokio::select! {
            biased;
            _ = entry.cancel.cancelled() => return,
            started = self.daemon.pull_model(&identifier) => started,
        };

        let mut events = match started {
            Ok(events) => events,
            Err(err) => {
                error!("Pull of {} could not start: {}", identifier, err);
                entry.fail(failure_message(err));
                return;
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = entry.cancel.cancelled() => {
                    debug!("Pull of {} stopped by cancellation", identifier);
                    return;
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) if event.is_success() => {
                    entry.state.send_modify(|job| job.apply(&event));
                    break;
                }
                Some(Ok(event)) => {
                    entry.state.send_if_modified(|job| {
                        let before = job.clone();
                        job.apply(&event);
                        *job != before
                    });
                }
                Some(Err(err)) => {
                    error!("Pull of {} failed: {}", identifier, err);
                    entry.fail(failure_message(err));
                    return;
                }
                None => {
                    error!("Pull of {} ended without success", identifier);
                    entry.fail("download ended before the daemon reported success".to_string());
                    return;
                }
            }
        }

        drop(events);

        if !entry.settle() {
            debug!("Pull of {} was cancelled as it finished", identifier);
        }

        // Refresh before publishing completion so the new record is visible
        // to anyone woken by the final state.
        if let Err(e) = self.list().await {
            warn!("Pulled {} but could not refresh the model list: {}", identifier, e);
        }

        if entry.state.send_if_modified(|job| job.complete()) {
            info!("Pulled model {}", identifier);
        }
    }
}

/// Message kept on a failed job; daemon error events are shown verbatim
fn failure_message(err: DaemonError) -> String {
    match err {
        DaemonError::Remote(message) => message,
        other => RegistryError::from(other).to_string(),
    }
}
