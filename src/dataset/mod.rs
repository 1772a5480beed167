//! Dataset lifecycle: load, locked sync, bounded retry, periodic refresh.
//!
//! A concrete dataset implements [`Dataset`] with two capabilities, fetching
//! and persisting a new snapshot (`perform_sync`) and mirroring the published
//! snapshot into memory (`reload_from_file`). [`SyncController`] drives
//! everything else.

mod controller;
mod schedule;
mod snapshot;


pub use controller::{ControllerState, SyncController, SyncSettings};
pub use snapshot::SnapshotCell;

use crate::error::Result;
use std::future::Future;

/// Capabilities a dataset supplies to the lifecycle controller.
pub trait Dataset: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch from the remote source and durably publish the snapshot file.
    ///
    /// Only ever called while the dataset's sync lock is held.
    fn perform_sync(&self) -> impl Future<Output = Result<()>> + Send;

    /// Replace the in-memory snapshot with the published file's contents.
    fn reload_from_file(&self) -> impl Future<Output = Result<()>> + Send;
}
