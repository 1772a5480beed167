//! RAII lock guard implementation.

use super::metadata::LockRecord;
use crate::error::{Result, SyncError};
use std::fs;
use std::path::{Path, PathBuf};

/// RAII guard for a lock file.
///
/// When dropped, the lock file is deleted if it still carries this guard's
/// token. A record that was reclaimed and re-created by another contender is
/// left alone. Failures during drop are logged, never raised.
#[derive(Debug)]
pub struct LockGuard {
    /// Path to the lock file.
    path: PathBuf,

    /// Token written into the lock file at acquisition.
    token: String,

    /// Whether the lock has been released manually.
    released: bool,
}

impl LockGuard {
    pub(super) fn new(path: PathBuf, token: String) -> Self {
        Self {
            path,
            token,
            released: false,
        }
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the acquisition token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Manually release the lock, surfacing errors.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_if_owned(&self.path, &self.token)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = remove_if_owned(&self.path, &self.token)
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

fn remove_if_owned(path: &Path, token: &str) -> Result<()> {
    match LockRecord::from_file(path) {
        Ok(record) if record.token != token => {
            tracing::warn!(
                path = %path.display(),
                holder = %record.owner,
                "lock was reclaimed by another holder; leaving it in place"
            );
            return Ok(());
        }
        // Missing: already gone. Unreadable: ours was the last write, remove it.
        Err(_) if !path.exists() => return Ok(()),
        _ => {}
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::LockError(format!(
            "failed to release lock '{}': {}",
            path.display(),
            e
        ))),
    }
}
