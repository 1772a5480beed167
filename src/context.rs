//! Filesystem layout for a synchronized dataset.
//!
//! Every component that touches a dataset's files resolves them through
//! `DatasetPaths`, so the snapshot, its staging file, and its locks always
//! agree on location:
//!
//! ```text
//! <data_dir>/<dataset>/<file>.json       published snapshot
//! <data_dir>/<dataset>/<file>.json.tmp   staging file during a sync
//! <data_dir>/<dataset>/locks/<stem>.lock sync lock record
//! <data_dir>/<dataset>/locks/<stem>.done completion marker
//! ```

use crate::locks::LockOptions;
use std::path::{Path, PathBuf};

/// Name of the lock directory inside a dataset directory.
pub const LOCKS_DIR_NAME: &str = "locks";

/// Resolved paths for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    /// `<data_dir>/<dataset>/`
    pub dataset_dir: PathBuf,

    /// The published snapshot.
    pub file: PathBuf,

    /// The staging file renamed over `file` on publish.
    pub staging_file: PathBuf,

    /// Directory holding the dataset's lock records.
    pub locks_dir: PathBuf,

    /// Lock key, derived from the snapshot's file stem.
    pub lock_key: String,
}

impl DatasetPaths {
    pub fn new<P: AsRef<Path>>(data_dir: P, dataset: &str, file_name: &str) -> Self {
        let dataset_dir = data_dir.as_ref().join(dataset);
        let file = dataset_dir.join(file_name);
        let staging_file = dataset_dir.join(format!("{}.tmp", file_name));
        let locks_dir = dataset_dir.join(LOCKS_DIR_NAME);
        let lock_key = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(dataset)
            .to_string();

        Self {
            dataset_dir,
            file,
            staging_file,
            locks_dir,
            lock_key,
        }
    }

    /// Lock options rooted at this dataset's lock directory.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions::new(&self.locks_dir)
    }
}
