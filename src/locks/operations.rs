//! Lock file acquisition, inspection, reclamation, listing, and clearing.
//!
//! These are synchronous filesystem operations on small files; the async
//! `LockManager` runs them on the blocking pool.

use super::guard::LockGuard;
use super::metadata::{CompletionMarker, LockRecord};
use super::types::LockInfo;
use crate::error::{Result, SyncError};
use crate::fs::atomic_write_file;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What a contender found at a lock path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LockState {
    /// No lock file.
    Vacant,
    /// A holder is alive. `None` when the file is still being written.
    Live(Option<LockRecord>),
    /// The holder is past its deadline. `None` when the file never became
    /// readable and is older than the caller's ttl.
    Expired(Option<LockRecord>),
}

/// Map a key (and optional scope) to a stable lock file path.
///
/// Characters outside `[A-Za-z0-9._-]` are replaced by `_`.
pub fn lock_path(directory: &Path, scope: Option<&str>, key: &str) -> PathBuf {
    let name = match scope {
        Some(scope) => format!("{}.{}", sanitize(scope), sanitize(key)),
        None => sanitize(key),
    };
    directory.join(format!("{}.lock", name))
}

/// Path of the completion marker paired with a lock file.
pub fn marker_path(lock_path: &Path) -> PathBuf {
    lock_path.with_extension("done")
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Try to create the lock file with create_new semantics.
///
/// Returns `Ok(None)` if the file already exists.
pub(crate) fn try_acquire(lock_path: &Path, record: &LockRecord) -> Result<Option<LockGuard>> {
    if let Some(parent) = lock_path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            SyncError::LockError(format!(
                "failed to create locks directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(SyncError::LockError(format!(
                "failed to acquire lock '{}': {}",
                lock_path.display(),
                e
            )));
        }
    };

    let json = record.to_json()?;
    file.write_all(json.as_bytes()).map_err(|e| {
        let _ = fs::remove_file(lock_path);
        SyncError::LockError(format!("failed to write lock record: {}", e))
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(lock_path);
        SyncError::LockError(format!("failed to sync lock file: {}", e))
    })?;

    Ok(Some(LockGuard::new(
        lock_path.to_path_buf(),
        record.token.clone(),
    )))
}

/// Inspect the lock file at `lock_path`.
///
/// An unreadable record is judged by its modification time against
/// `fallback_ttl`.
pub(crate) fn inspect(lock_path: &Path, fallback_ttl: Duration, now: DateTime<Utc>) -> Result<LockState> {
    match LockRecord::from_file(lock_path) {
        Ok(record) if record.is_expired_at(now) => Ok(LockState::Expired(Some(record))),
        Ok(record) => Ok(LockState::Live(Some(record))),
        Err(_) => {
            let metadata = match fs::metadata(lock_path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LockState::Vacant),
                Err(e) => {
                    return Err(SyncError::LockError(format!(
                        "failed to stat lock file '{}': {}",
                        lock_path.display(),
                        e
                    )));
                }
            };

            let modified: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or(now);
            let age = now.signed_duration_since(modified).to_std().unwrap_or_default();
            if age > fallback_ttl {
                Ok(LockState::Expired(None))
            } else {
                Ok(LockState::Live(None))
            }
        }
    }
}

/// Remove an expired lock file so a new holder can create it.
///
/// The file is first renamed to a unique tombstone, so only one contender
/// can take it. If the tombstone turns out not to be the record that was
/// judged expired (it was released and re-acquired in between), it is put
/// back with a no-clobber hard link.
///
/// Returns `true` if the expired record was removed.
pub(crate) fn reclaim_stale(lock_path: &Path, observed: Option<&LockRecord>) -> Result<bool> {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let tombstone = lock_path.with_extension(format!("stale.{}", &suffix[..8]));

    match fs::rename(lock_path, &tombstone) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(SyncError::LockError(format!(
                "failed to reclaim lock '{}': {}",
                lock_path.display(),
                e
            )));
        }
    }

    let taken = LockRecord::from_file(&tombstone).ok();
    let is_observed = match (observed, &taken) {
        (Some(observed), Some(taken)) => observed.token == taken.token,
        (None, None) => true,
        _ => false,
    };

    if !is_observed
        && let Err(e) = fs::hard_link(&tombstone, lock_path)
    {
        tracing::warn!(
            path = %lock_path.display(),
            error = %e,
            "could not restore a live lock taken during reclaim"
        );
    }

    if let Err(e) = fs::remove_file(&tombstone) {
        tracing::warn!(path = %tombstone.display(), error = %e, "failed to remove lock tombstone");
    }

    Ok(is_observed)
}

/// Refresh `renewed_at` on a lock this process still owns.
///
/// Returns `false` if the file no longer carries `token`.
pub(crate) fn renew(lock_path: &Path, token: &str) -> Result<bool> {
    let mut record = match LockRecord::from_file(lock_path) {
        Ok(record) => record,
        Err(_) if !lock_path.exists() => return Ok(false),
        Err(e) => return Err(e),
    };
    if record.token != token {
        return Ok(false);
    }

    record.renewed_at = Some(Utc::now());
    atomic_write_file(lock_path, &record.to_json()?)
        .map_err(|e| SyncError::LockError(format!("failed to renew lock: {}", e)))?;
    Ok(true)
}

/// Record that the holder of `record` finished its critical section.
pub(crate) fn write_completion(lock_path: &Path, record: &LockRecord) -> Result<()> {
    let marker = CompletionMarker::for_record(record);
    let json = serde_json::to_string_pretty(&marker)
        .map_err(|e| SyncError::LockError(format!("failed to serialize marker: {}", e)))?;
    atomic_write_file(marker_path(lock_path), &json)
        .map_err(|e| SyncError::LockError(format!("failed to write completion marker: {}", e)))
}

/// Read the completion marker paired with `lock_path`, if any.
pub fn read_completion(lock_path: &Path) -> Option<CompletionMarker> {
    let content = fs::read_to_string(marker_path(lock_path)).ok()?;
    serde_json::from_str(&content).ok()
}

/// List all lock files in `directory`.
///
/// Unreadable lock files are skipped.
pub fn list_locks(directory: &Path) -> Result<Vec<LockInfo>> {
    let mut locks = Vec::new();

    if !directory.exists() {
        return Ok(locks);
    }

    let entries = fs::read_dir(directory).map_err(|e| {
        SyncError::LockError(format!(
            "failed to read locks directory '{}': {}",
            directory.display(),
            e
        ))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            SyncError::LockError(format!("failed to read locks directory entry: {}", e))
        })?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }

        let record = match LockRecord::from_file(&path) {
            Ok(record) => record,
            Err(_) => continue,
        };

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let is_stale = record.is_expired();

        locks.push(LockInfo {
            path,
            name,
            record,
            is_stale,
        });
    }

    locks.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(locks)
}

/// Forcibly remove the lock named `name` from `directory`.
///
/// The caller is responsible for deciding that clearing is appropriate.
/// Returns the removed lock's information for reporting.
pub fn clear_lock(directory: &Path, name: &str) -> Result<LockInfo> {
    if name.is_empty() || sanitize(name) != name {
        return Err(SyncError::UserError(format!("invalid lock name '{}'", name)));
    }

    let path = directory.join(format!("{}.lock", name));
    if !path.exists() {
        return Err(SyncError::UserError(format!(
            "lock '{}' does not exist at: {}",
            name,
            path.display()
        )));
    }

    let record = LockRecord::from_file(&path)?;
    let is_stale = record.is_expired();
    let info = LockInfo {
        path: path.clone(),
        name: name.to_string(),
        record,
        is_stale,
    };

    fs::remove_file(&path).map_err(|e| {
        SyncError::LockError(format!("failed to clear lock '{}': {}", path.display(), e))
    })?;

    Ok(info)
}
