//! Error types for snapsync.
//!
//! Uses thiserror for derive macros. Every variant carries a rendered message
//! so the type stays `Clone`: the single-flight initialisation of a dataset
//! hands the same outcome to every waiter.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for snapsync operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Invalid configuration or arguments.
    #[error("{0}")]
    UserError(String),

    /// The lock could not be acquired within the wait budget.
    #[error("Lock acquisition timed out: {0}")]
    LockTimeout(String),

    /// The lock directory or a lock record could not be read or written.
    #[error("Lock operation failed: {0}")]
    LockError(String),

    /// The remote source answered with a failure status or a malformed payload.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// Writing or publishing the snapshot failed (disk full, permissions).
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// The published snapshot on disk could not be decoded.
    #[error("Snapshot parse failed: {0}")]
    Parse(String),
}

impl SyncError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::UserError(_) => exit_codes::USER_ERROR,
            SyncError::RemoteFetch(_) => exit_codes::FETCH_FAILURE,
            SyncError::Persistence(_) | SyncError::Parse(_) => exit_codes::PERSISTENCE_FAILURE,
            SyncError::LockTimeout(_) | SyncError::LockError(_) => exit_codes::LOCK_FAILURE,
        }
    }

    /// Whether this error means the on-disk snapshot itself is unusable.
    pub fn is_corrupt_snapshot(&self) -> bool {
        matches!(self, SyncError::Parse(_))
    }
}

/// Result type alias for snapsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_has_correct_exit_code() {
        let err = SyncError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn test_lock_errors_share_exit_code() {
        assert_eq!(
            SyncError::LockTimeout("releases".to_string()).exit_code(),
            exit_codes::LOCK_FAILURE
        );
        assert_eq!(
            SyncError::LockError("permission denied".to_string()).exit_code(),
            exit_codes::LOCK_FAILURE
        );
    }

    #[test]
    fn test_persistence_and_parse_share_exit_code() {
        assert_eq!(
            SyncError::Persistence("disk full".to_string()).exit_code(),
            exit_codes::PERSISTENCE_FAILURE
        );
        assert_eq!(
            SyncError::Parse("unexpected EOF".to_string()).exit_code(),
            exit_codes::PERSISTENCE_FAILURE
        );
    }

    #[test]
    fn test_remote_fetch_has_correct_exit_code() {
        let err = SyncError::RemoteFetch("HTTP 503".to_string());
        assert_eq!(err.exit_code(), exit_codes::FETCH_FAILURE);
    }

    #[test]
    fn test_only_parse_errors_mark_snapshot_corrupt() {
        assert!(SyncError::Parse("x".to_string()).is_corrupt_snapshot());
        assert!(!SyncError::Persistence("x".to_string()).is_corrupt_snapshot());
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let err = SyncError::LockTimeout("releases after 300000ms".to_string());
        assert_eq!(
            err.to_string(),
            "Lock acquisition timed out: releases after 300000ms"
        );

        let err = SyncError::RemoteFetch("HTTP 502 Bad Gateway".to_string());
        assert_eq!(err.to_string(), "Remote fetch failed: HTTP 502 Bad Gateway");
    }
}
