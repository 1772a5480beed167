//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a snapsync process.
///
/// This struct represents the contents of `snapsync.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Process settings
    // =========================================================================
    /// Root directory for snapshots and lock files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub log_json: bool,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Interval between lock acquisition attempts while contended.
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,

    // =========================================================================
    // Datasets
    // =========================================================================
    /// Datasets kept in sync by this process.
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_json: false,
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            datasets: Vec::new(),
        }
    }
}
