//! Lock record and completion marker structures.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Lock record stored in a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Name of the protected resource.
    pub key: String,

    /// Random per-acquisition token; release and renewal only act on files
    /// that still carry it.
    pub token: String,

    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Process ID of the lock holder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Timestamp when the lock was acquired.
    pub acquired_at: DateTime<Utc>,

    /// Timestamp of the most recent heartbeat, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewed_at: Option<DateTime<Utc>>,

    /// Time-to-live in milliseconds, counted from the last heartbeat.
    pub ttl_ms: u64,
}

impl LockRecord {
    /// Create a fresh record with a new token and the current timestamp.
    pub fn new(key: &str, owner: &str, ttl: Duration) -> Self {
        Self {
            key: key.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            pid: Some(std::process::id()),
            acquired_at: Utc::now(),
            renewed_at: None,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Parse a lock record from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            SyncError::LockError(format!(
                "failed to read lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SyncError::LockError(format!(
                "failed to parse lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Serialize the record to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::LockError(format!("failed to serialize lock record: {}", e)))
    }

    /// The instant after which the record is dead.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = ChronoDuration::milliseconds(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX));
        let base = self.renewed_at.unwrap_or(self.acquired_at);
        base.checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the record had expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() < now
    }

    /// Whether the record has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Calculate the age of the lock.
    pub fn age(&self) -> ChronoDuration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds.max(0))
        }
    }
}

/// Written by a holder whose critical section succeeded, just before release.
///
/// Waiters that acquire the lock afterwards compare `completed_at` with the
/// moment they started waiting to learn the protected work is already done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub key: String,
    pub token: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletionMarker {
    pub fn for_record(record: &LockRecord) -> Self {
        Self {
            key: record.key.clone(),
            token: record.token.clone(),
            completed_at: Utc::now(),
        }
    }

    /// Whether the marked work finished at or after `since`.
    pub fn is_fresh_since(&self, since: DateTime<Utc>) -> bool {
        self.completed_at >= since
    }
}

/// Get the owner string for lock records.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
