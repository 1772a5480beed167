//! Filesystem utilities for snapsync.
//!
//! Atomic small-file writes (lock records, markers) and streaming staged
//! writes with atomic publish (snapshots).

pub mod atomic;
mod staged;

pub use atomic::{atomic_write, atomic_write_file, staging_path};
pub use staged::StagedFile;
