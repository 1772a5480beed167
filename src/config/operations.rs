//! Config loading, validation, and utility operations.

use super::model::Config;
use super::types::DatasetConfig;
use crate::context::DatasetPaths;
use crate::error::{Result, SyncError};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| SyncError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| SyncError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_poll_interval_ms` must be positive
    /// - dataset names must be unique, non-empty, and free of path separators
    /// - each dataset `file` must be a bare `*.json` file name
    /// - intervals, timeouts, and ttl must be positive
    /// - `source_url` must be an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.lock_poll_interval_ms == 0 {
            return Err(invalid("lock_poll_interval_ms must be greater than 0"));
        }

        let mut seen = std::collections::HashSet::new();
        for dataset in &self.datasets {
            dataset.validate()?;
            if !seen.insert(dataset.name.as_str()) {
                return Err(invalid(&format!(
                    "dataset name '{}' is used more than once",
                    dataset.name
                )));
            }
        }

        Ok(())
    }

    /// Look up a dataset by name.
    pub fn dataset(&self, name: &str) -> Result<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name).ok_or_else(|| {
            SyncError::UserError(format!(
                "unknown dataset '{}' (configured: {})",
                name,
                self.datasets
                    .iter()
                    .map(|d| d.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Filesystem layout for a dataset under `data_dir`.
    pub fn paths_for(&self, dataset: &DatasetConfig) -> DatasetPaths {
        DatasetPaths::new(&self.data_dir, &dataset.name, &dataset.file)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }
}

impl DatasetConfig {
    /// Validate one dataset entry.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("dataset name must be non-empty"));
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(invalid(&format!(
                "dataset name '{}' must not contain path separators",
                self.name
            )));
        }

        if self.file.contains(['/', '\\']) || !self.file.ends_with(".json") || self.file == ".json" {
            return Err(invalid(&format!(
                "dataset '{}': file must be a bare *.json name (found '{}')",
                self.name, self.file
            )));
        }

        for (field, value) in [
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("lock_timeout_ms", self.lock_timeout_ms),
            ("lock_ttl_ms", self.lock_ttl_ms),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(invalid(&format!(
                    "dataset '{}': {} must be greater than 0",
                    self.name, field
                )));
            }
        }

        let url = reqwest::Url::parse(&self.source_url).map_err(|e| {
            invalid(&format!(
                "dataset '{}': source_url '{}' is not a valid URL: {}",
                self.name, self.source_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(&format!(
                "dataset '{}': source_url must use http or https",
                self.name
            )));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> SyncError {
    SyncError::UserError(format!("config validation failed: {}", message))
}
