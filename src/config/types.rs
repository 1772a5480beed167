//! Per-dataset configuration and serde default functions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of one synchronized dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset name; also the directory under `data_dir`.
    pub name: String,

    /// Snapshot file name inside the dataset directory (must end in `.json`).
    #[serde(default = "default_file")]
    pub file: String,

    /// Paginated listing endpoint. Pages are requested as `?page=N`.
    pub source_url: String,

    /// Seconds between periodic refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Immediate retries before falling back to a delayed retry.
    #[serde(default = "default_max_sync_retries")]
    pub max_sync_retries: u32,

    /// Maximum time to wait for the sync lock, in milliseconds.
    #[serde(default = "default_lock_ms")]
    pub lock_timeout_ms: u64,

    /// Time after which an unrenewed sync lock is abandoned, in milliseconds.
    #[serde(default = "default_lock_ms")]
    pub lock_ttl_ms: u64,

    /// Per-request timeout for page fetches, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay between page requests, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Records whose hash contains this token are dropped.
    #[serde(default = "default_placeholder_token")]
    pub placeholder_token: String,

    /// User-Agent sent to the source.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl DatasetConfig {
    /// A dataset with all defaults.
    pub fn new(name: &str, source_url: &str) -> Self {
        Self {
            name: name.to_string(),
            file: default_file(),
            source_url: source_url.to_string(),
            refresh_interval_secs: default_refresh_interval_secs(),
            max_sync_retries: default_max_sync_retries(),
            lock_timeout_ms: default_lock_ms(),
            lock_ttl_ms: default_lock_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            page_delay_ms: default_page_delay_ms(),
            placeholder_token: default_placeholder_token(),
            user_agent: default_user_agent(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

// Default value functions for serde
pub(crate) fn default_data_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("data")
}
pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
pub(crate) fn default_lock_poll_interval_ms() -> u64 {
    250
}
pub(crate) fn default_file() -> String {
    "releases.json".to_string()
}
pub(crate) fn default_refresh_interval_secs() -> u64 {
    86_400
}
pub(crate) fn default_max_sync_retries() -> u32 {
    1
}
pub(crate) fn default_lock_ms() -> u64 {
    300_000
}
pub(crate) fn default_request_timeout_secs() -> u64 {
    15
}
pub(crate) fn default_page_delay_ms() -> u64 {
    500
}
pub(crate) fn default_placeholder_token() -> String {
    "REDACTED".to_string()
}
pub(crate) fn default_user_agent() -> String {
    format!("snapsync/{}", env!("CARGO_PKG_VERSION"))
}
