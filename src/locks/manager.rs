//! Async lock manager: wait, reclaim, run, renew, release.

use super::guard::LockGuard;
use super::metadata::{LockRecord, get_owner_string};
use super::operations::{self, LockState};
use super::types::{DEFAULT_POLL_INTERVAL, LockOptions, LockOutcome};
use crate::error::{Result, SyncError};
use chrono::Utc;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Named, TTL-bounded mutual exclusion over lock files.
///
/// The filesystem is the only source of truth, so tasks in one process and
/// independent processes sharing `directory` all agree on the holder. One
/// manager is constructed per process and cloned into each dataset.
#[derive(Debug, Clone)]
pub struct LockManager {
    owner: String,
    poll_interval: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            owner: get_owner_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the interval between acquisition attempts.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run `critical` while holding the lock for `key`.
    ///
    /// Waits up to `options.timeout` for the lock. If another holder completes
    /// the protected work while this caller waits, returns
    /// `LockOutcome::Cached` without running `critical`. The lock file is
    /// removed on every exit path, and its record is renewed every
    /// `ttl / 3` while `critical` runs.
    pub async fn with_lock<F, Fut, T>(
        &self,
        key: &str,
        options: &LockOptions,
        critical: F,
    ) -> Result<LockOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let path = operations::lock_path(&options.directory, options.scope.as_deref(), key);
        let started_waiting = Utc::now();
        let deadline = Instant::now() + options.timeout;
        let mut waited = false;

        let (guard, record) = loop {
            let record = LockRecord::new(key, &self.owner, options.ttl);
            let attempt = {
                let path = path.clone();
                let record = record.clone();
                blocking(move || operations::try_acquire(&path, &record)).await?
            };

            if let Some(guard) = attempt {
                break (guard, record);
            }

            waited = true;
            let state = {
                let path = path.clone();
                let ttl = options.ttl;
                blocking(move || operations::inspect(&path, ttl, Utc::now())).await?
            };

            match state {
                LockState::Vacant => continue,
                LockState::Expired(stale) => {
                    tracing::warn!(
                        key,
                        holder = stale.as_ref().map(|r| r.owner.as_str()).unwrap_or("unknown"),
                        "reclaiming expired lock"
                    );
                    let path = path.clone();
                    let reclaimed =
                        blocking(move || operations::reclaim_stale(&path, stale.as_ref())).await?;
                    if reclaimed {
                        continue;
                    }
                }
                LockState::Live(holder) => {
                    tracing::debug!(
                        key,
                        holder = holder.as_ref().map(|r| r.owner.as_str()).unwrap_or("unknown"),
                        "lock is held, waiting"
                    );
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SyncError::LockTimeout(format!(
                    "'{}' still held after {}ms",
                    key,
                    options.timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        };

        if waited {
            let marker = {
                let path = path.clone();
                blocking(move || Ok(operations::read_completion(&path))).await?
            };
            if let Some(marker) = marker
                && marker.is_fresh_since(started_waiting)
            {
                tracing::debug!(key, "work completed by another holder while waiting");
                release(key, guard).await;
                return Ok(LockOutcome::Cached);
            }
        }

        tracing::debug!(key, token = %record.token, "lock acquired");
        let heartbeat = Heartbeat::start(
            path.clone(),
            record.token.clone(),
            options.heartbeat_interval(),
        );
        let outcome = critical().await;
        heartbeat.stop().await;

        if outcome.is_ok() {
            let path = path.clone();
            let record = record.clone();
            if let Err(e) = blocking(move || operations::write_completion(&path, &record)).await {
                tracing::warn!(key, error = %e, "failed to write completion marker");
            }
        }

        release(key, guard).await;
        outcome.map(LockOutcome::Ran)
    }

    /// Whether a live (non-expired) lock for `key` exists right now.
    pub async fn is_locked(&self, key: &str, options: &LockOptions) -> Result<bool> {
        let path = operations::lock_path(&options.directory, options.scope.as_deref(), key);
        let ttl = options.ttl;
        let state = blocking(move || operations::inspect(&path, ttl, Utc::now())).await?;
        Ok(matches!(state, LockState::Live(_)))
    }

    /// Path of the lock file used for `key`.
    pub fn lock_path(&self, key: &str, options: &LockOptions) -> PathBuf {
        operations::lock_path(&options.directory, options.scope.as_deref(), key)
    }
}

/// Release a held lock. A failure is logged and left for TTL expiry; the
/// outcome of the protected work stands.
async fn release(key: &str, guard: LockGuard) {
    match blocking(move || guard.release()).await {
        Ok(()) => tracing::debug!(key, "lock released"),
        Err(e) => tracing::warn!(key, error = %e, "failed to release lock"),
    }
}

/// Background task renewing a held lock until stopped.
struct Heartbeat {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    fn start(path: PathBuf, token: String, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tokio::time::sleep(every) => {}
                }
                if !renew_once(&path, &token).await {
                    break;
                }
            }
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn renew_once(path: &Path, token: &str) -> bool {
    let path_buf = path.to_path_buf();
    let token_owned = token.to_string();
    match blocking(move || operations::renew(&path_buf, &token_owned)).await {
        Ok(true) => true,
        Ok(false) => {
            tracing::warn!(path = %path.display(), "lock ownership lost while held");
            false
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to renew lock");
            true
        }
    }
}

/// Run a small synchronous filesystem operation on the blocking pool.
async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| SyncError::LockError(format!("lock task failed: {}", e)))?
}
