//! Load, sync, retry, and refresh state machine shared by all datasets.

use super::Dataset;
use super::schedule::{ScheduledTask, TaskSlot};
use crate::config::{Config, DatasetConfig};
use crate::error::Result;
use crate::locks::{LockManager, LockOptions, LockOutcome};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Timing and locking parameters for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Period of the background refresh.
    pub refresh_interval: Duration,

    /// Immediate retries allowed before falling back to a delayed retry.
    pub max_sync_retries: u32,

    /// Name of the lock guarding the dataset's sync.
    pub lock_key: String,

    pub lock_options: LockOptions,

    /// The published snapshot file.
    pub data_file: PathBuf,
}

impl SyncSettings {
    /// Settings for a configured dataset.
    pub fn for_dataset(config: &Config, dataset: &DatasetConfig) -> Self {
        let paths = config.paths_for(dataset);
        Self {
            refresh_interval: dataset.refresh_interval(),
            max_sync_retries: dataset.max_sync_retries,
            lock_options: paths
                .lock_options()
                .with_timeout(dataset.lock_timeout())
                .with_ttl(dataset.lock_ttl()),
            lock_key: paths.lock_key,
            data_file: paths.file,
        }
    }

    /// Delay before a retry once immediate retries are exhausted.
    pub fn retry_delay(&self) -> Duration {
        self.refresh_interval / 4
    }
}

/// Observable lifecycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialised,
    Loading,
    Ready,
    /// Immediate retries are exhausted and a delayed retry is armed.
    Retrying,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ControllerState::Uninitialised => "uninitialised",
            ControllerState::Loading => "loading",
            ControllerState::Ready => "ready",
            ControllerState::Retrying => "retrying",
        };
        f.write_str(label)
    }
}

struct Inner<D> {
    dataset: D,
    locks: LockManager,
    settings: SyncSettings,
    init: OnceCell<Result<()>>,
    retry_count: AtomicU32,
    state: Mutex<ControllerState>,
    retry_task: TaskSlot,
    refresh_task: TaskSlot,
    closed: AtomicBool,
}

impl<D> Drop for Inner<D> {
    fn drop(&mut self) {
        for slot in [&self.retry_task, &self.refresh_task] {
            if let Some(task) = slot.take() {
                task.cancel();
            }
        }
    }
}

/// Drives a [`Dataset`] through load, locked sync, bounded retry, and
/// periodic refresh.
///
/// Cloning is cheap; clones share the same state and timers. Background
/// timers hold only a weak reference, so dropping every clone stops them.
pub struct SyncController<D> {
    inner: Arc<Inner<D>>,
}

impl<D> Clone for SyncController<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Dataset> SyncController<D> {
    pub fn new(dataset: D, locks: LockManager, settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                dataset,
                locks,
                settings,
                init: OnceCell::new(),
                retry_count: AtomicU32::new(0),
                state: Mutex::new(ControllerState::Uninitialised),
                retry_task: TaskSlot::default(),
                refresh_task: TaskSlot::default(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn dataset(&self) -> &D {
        &self.inner.dataset
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> ControllerState {
        *self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Consecutive failed attempts since the last success.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::SeqCst)
    }

    /// Delay of the armed delayed retry, if any.
    pub fn pending_retry_delay(&self) -> Option<Duration> {
        self.inner.retry_task.pending_delay()
    }

    /// Whether the periodic refresh is armed.
    pub fn refresh_armed(&self) -> bool {
        self.inner.refresh_task.is_armed()
    }

    /// Load or sync the dataset and arm the periodic refresh.
    ///
    /// Runs at most once per controller; concurrent and later callers await
    /// and receive the outcome of that single run. A failed outcome still
    /// leaves retries and the refresh armed.
    pub async fn initialise(&self) -> Result<()> {
        self.inner
            .init
            .get_or_init(|| self.load_data())
            .await
            .clone()
    }

    async fn load_data(&self) -> Result<()> {
        let name = self.inner.dataset.name();
        self.set_state(ControllerState::Loading);

        let exists = tokio::fs::try_exists(&self.inner.settings.data_file)
            .await
            .unwrap_or(false);

        let result = if exists {
            match self.inner.dataset.reload_from_file().await {
                Ok(()) => {
                    tracing::info!(dataset = name, "loaded snapshot from disk");
                    self.inner.retry_count.store(0, Ordering::SeqCst);
                    self.set_state(ControllerState::Ready);
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(dataset = name, error = %e, "snapshot unusable, forcing resync");
                    self.sync_with_retry().await
                }
            }
        } else {
            tracing::info!(dataset = name, "no snapshot on disk, syncing");
            self.sync_with_retry().await
        };

        self.start_sync_interval();
        result
    }

    /// Sync, retrying immediately up to `max_sync_retries` times.
    ///
    /// When immediate retries are exhausted a delayed retry is armed at
    /// `refresh_interval / 4` and the last error is returned. A success
    /// disarms any pending delayed retry.
    pub async fn sync_with_retry(&self) -> Result<()> {
        let name = self.inner.dataset.name();
        let max = self.inner.settings.max_sync_retries;

        loop {
            match self.sync_once().await {
                Ok(_) => {
                    self.inner.retry_count.store(0, Ordering::SeqCst);
                    if let Some(pending) = self.inner.retry_task.take() {
                        pending.cancel();
                    }
                    self.set_state(ControllerState::Ready);
                    return Ok(());
                }
                Err(e) => {
                    let attempt = self.inner.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt <= max {
                        tracing::warn!(dataset = name, attempt, error = %e, "sync failed, retrying");
                        continue;
                    }
                    tracing::error!(
                        dataset = name,
                        attempt,
                        error = %e,
                        "sync failed, immediate retries exhausted"
                    );
                    self.schedule_retry_sync();
                    return Err(e);
                }
            }
        }
    }

    /// One locked sync attempt.
    ///
    /// Runs `perform_sync` under the dataset's lock, or skips it when another
    /// holder finished the work while this one waited. Either way the
    /// in-memory snapshot is then reloaded from the published file.
    pub async fn sync_once(&self) -> Result<LockOutcome<()>> {
        let inner = &self.inner;
        let dataset = &inner.dataset;
        let settings = &inner.settings;

        let outcome = inner
            .locks
            .with_lock(&settings.lock_key, &settings.lock_options, || {
                dataset.perform_sync()
            })
            .await?;

        if outcome.is_cached() {
            tracing::info!(dataset = dataset.name(), "snapshot refreshed by another worker");
        }

        if tokio::fs::try_exists(&settings.data_file)
            .await
            .unwrap_or(false)
        {
            dataset.reload_from_file().await?;
        }

        Ok(outcome)
    }

    /// Arm a one-shot retry at `refresh_interval / 4`, replacing any pending
    /// retry.
    pub fn schedule_retry_sync(&self) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }

        let delay = self.inner.settings.retry_delay();
        let weak = Arc::downgrade(&self.inner);
        tracing::info!(
            dataset = self.inner.dataset.name(),
            delay_ms = delay.as_millis() as u64,
            "scheduling delayed retry"
        );

        self.set_state(ControllerState::Retrying);
        self.inner.retry_task.replace(ScheduledTask::once(delay, async move {
            if let Some(controller) = upgrade(&weak) {
                let _ = controller.sync_with_retry().await;
            }
        }));
    }

    /// Arm the periodic refresh, replacing any previous one.
    pub fn start_sync_interval(&self) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }

        let period = self.inner.settings.refresh_interval;
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .refresh_task
            .replace(ScheduledTask::repeating(period, move || {
                let weak = weak.clone();
                async move {
                    let Some(controller) = upgrade(&weak) else {
                        return;
                    };
                    tracing::debug!(dataset = controller.dataset().name(), "periodic refresh");
                    if let Err(e) = controller.sync_with_retry().await {
                        tracing::warn!(
                            dataset = controller.dataset().name(),
                            error = %e,
                            "periodic refresh failed"
                        );
                    }
                }
            }));
    }

    /// Cancel the refresh and any pending retry, aborting a sync in flight.
    ///
    /// An aborted sync drops its lock guard and staging file, which removes
    /// both from disk.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(task) = self.inner.refresh_task.take() {
            task.shutdown().await;
        }
        if let Some(task) = self.inner.retry_task.take() {
            task.shutdown().await;
        }
        tracing::debug!(dataset = self.inner.dataset.name(), "controller shut down");
    }

    fn set_state(&self, next: ControllerState) {
        *self.inner.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
    }
}

fn upgrade<D>(weak: &Weak<Inner<D>>) -> Option<SyncController<D>> {
    weak.upgrade().map(|inner| SyncController { inner })
}
