//! Locking subsystem for snapsync.
//!
//! Named, TTL-bounded mutual exclusion shared by tasks in one process and by
//! independent processes that see the same data directory.
//!
//! # Lock Files
//!
//! Lock files live in `<data_dir>/<dataset>/locks/` and are named
//! `[<scope>.]<key>.lock`. They are created using **create_new** semantics
//! (exclusive create), so two contenders can never both succeed.
//!
//! # Lock Records
//!
//! Each lock file contains JSON:
//! - `key`: the protected resource
//! - `token`: random per-acquisition identifier, checked on release and renewal
//! - `owner`, `pid`: who holds it (`user@HOST`)
//! - `acquired_at`, `renewed_at`, `ttl_ms`: the record is dead once
//!   `(renewed_at or acquired_at) + ttl` has passed, and any contender may
//!   reclaim it
//!
//! # Completion Markers
//!
//! A holder whose critical section succeeds writes `[<scope>.]<key>.done`
//! before releasing. A waiter that then acquires the lock and finds a marker
//! newer than its own wait start reports `LockOutcome::Cached` instead of
//! repeating the work.
//!
//! # RAII Guards
//!
//! The lock file is removed when its guard is dropped, including on panic or
//! task cancellation. If deletion fails during drop, a warning is logged.

mod guard;
mod manager;
mod metadata;
mod operations;
mod types;


pub use guard::LockGuard;
pub use manager::LockManager;
pub use metadata::{CompletionMarker, LockRecord};
pub use operations::{clear_lock, list_locks, lock_path, marker_path, read_completion};
pub use types::{DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL, LockInfo, LockOptions, LockOutcome};
