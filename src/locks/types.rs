//! Lock option, outcome, and information structures.

use super::metadata::LockRecord;
use std::path::PathBuf;
use std::time::Duration;

/// Default lock wait budget and time-to-live: five minutes.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Default interval between acquisition attempts while contended.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Parameters for one `with_lock` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Optional namespace prepended to the key in the lock file name.
    pub scope: Option<String>,

    /// Directory holding the lock files.
    pub directory: PathBuf,

    /// Maximum time to wait for the lock before giving up.
    pub timeout: Duration,

    /// Time after the last heartbeat at which a record is considered abandoned.
    pub ttl: Duration,
}

impl LockOptions {
    /// Options with the default timeout and ttl and no scope.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            scope: None,
            directory: directory.into(),
            timeout: DEFAULT_LOCK_TIMEOUT,
            ttl: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Interval between heartbeats for a holder of this lock.
    pub fn heartbeat_interval(&self) -> Duration {
        (self.ttl / 3).max(Duration::from_millis(10))
    }
}

/// Result of `LockManager::with_lock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// This caller held the lock and ran the critical section.
    Ran(T),
    /// Another holder completed the protected work while this caller waited;
    /// the critical section was not run.
    Cached,
}

impl<T> LockOutcome<T> {
    pub fn is_cached(&self) -> bool {
        matches!(self, LockOutcome::Cached)
    }

    /// The critical section's value, if this caller ran it.
    pub fn into_ran(self) -> Option<T> {
        match self {
            LockOutcome::Ran(value) => Some(value),
            LockOutcome::Cached => None,
        }
    }
}

/// Information about a lock file found on disk.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The lock name (file stem, e.g. "releases").
    pub name: String,

    /// The lock record.
    pub record: LockRecord,

    /// Whether the record is past its deadline.
    pub is_stale: bool,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (owner: {}, pid: {}, age: {}, ttl: {}ms{})",
            self.name,
            self.record.owner,
            self.record
                .pid
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.record.age_string(),
            self.record.ttl_ms,
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
