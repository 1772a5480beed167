//! Release index: a grouped, file-backed snapshot of a paginated listing.
//!
//! Readers call [`ReleaseIndex::get_releases`], which never touches the
//! network or disk. The snapshot behind it is refreshed by the lifecycle
//! controller through the [`Dataset`] implementation.

pub mod pipeline;
pub mod validate;

#[cfg(test)]
mod tests;

pub use pipeline::{PipelineOptions, PublishReport, fetch_and_publish};

use crate::config::{Config, DatasetConfig};
use crate::dataset::{Dataset, SnapshotCell};
use crate::error::{Result, SyncError};
use crate::source::{HttpPagedSource, PagedSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Version tag written into every published snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One accepted release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub group_id: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub preferred: bool,
}

/// Published snapshot file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    version: u32,
    entries: Vec<Release>,
    last_updated: DateTime<Utc>,
}

/// In-memory snapshot: releases grouped by `groupId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSnapshot {
    pub by_group: HashMap<String, Vec<Release>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ReleaseSnapshot {
    /// Group `entries`, dropping repeated hashes within a group. Order of
    /// first appearance is kept.
    pub fn from_entries(entries: Vec<Release>, last_updated: Option<DateTime<Utc>>) -> Self {
        let mut by_group: HashMap<String, Vec<Release>> = HashMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for release in entries {
            if !seen.insert((release.group_id.clone(), release.hash.clone())) {
                continue;
            }
            by_group
                .entry(release.group_id.clone())
                .or_default()
                .push(release);
        }

        Self {
            by_group,
            last_updated,
        }
    }

    /// Total number of releases across all groups.
    pub fn len(&self) -> usize {
        self.by_group.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_group.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.by_group.len()
    }

    pub fn get(&self, group_id: &str) -> &[Release] {
        self.by_group.get(group_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Read and decode a published snapshot file.
///
/// A missing or unreadable file is a `Persistence` error; a file that
/// does not decode is a `Parse` error.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<ReleaseSnapshot> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        SyncError::Persistence(format!("failed to open snapshot '{}': {}", path.display(), e))
    })?;

    let decoded: SnapshotFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        SyncError::Parse(format!("'{}': {}", path.display(), e))
    })?;

    if decoded.version != SNAPSHOT_VERSION {
        return Err(SyncError::Parse(format!(
            "'{}': unsupported snapshot version {} (expected {})",
            path.display(),
            decoded.version,
            SNAPSHOT_VERSION
        )));
    }

    Ok(ReleaseSnapshot::from_entries(
        decoded.entries,
        Some(decoded.last_updated),
    ))
}

/// File-backed release index refreshed from a paginated source.
pub struct ReleaseIndex<S> {
    name: String,
    source: S,
    file: PathBuf,
    options: PipelineOptions,
    snapshot: SnapshotCell<ReleaseSnapshot>,
    last_report: Mutex<Option<PublishReport>>,
}

impl ReleaseIndex<HttpPagedSource> {
    /// Build an index for a configured dataset, backed by its HTTP source.
    pub fn from_config(config: &Config, dataset: &DatasetConfig) -> Result<Self> {
        let source = HttpPagedSource::new(
            &dataset.source_url,
            dataset.request_timeout(),
            &dataset.user_agent,
        )?;
        let paths = config.paths_for(dataset);
        Ok(Self::new(
            &dataset.name,
            source,
            paths.file,
            PipelineOptions::for_dataset(dataset),
        ))
    }
}

impl<S: PagedSource> ReleaseIndex<S> {
    pub fn new<P: Into<PathBuf>>(name: &str, source: S, file: P, options: PipelineOptions) -> Self {
        Self {
            name: name.to_string(),
            source,
            file: file.into(),
            options,
            snapshot: SnapshotCell::default(),
            last_report: Mutex::new(None),
        }
    }

    /// Releases for `group_id`; empty when the group is unknown or nothing
    /// is loaded yet.
    pub fn get_releases(&self, group_id: &str) -> Vec<Release> {
        self.snapshot.load().get(group_id).to_vec()
    }

    /// The current in-memory snapshot.
    pub fn snapshot(&self) -> Arc<ReleaseSnapshot> {
        self.snapshot.load()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Report of the last publish performed by this process.
    pub fn last_report(&self) -> Option<PublishReport> {
        self.last_report
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl<S: PagedSource + 'static> Dataset for ReleaseIndex<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform_sync(&self) -> Result<()> {
        tracing::info!(dataset = %self.name, source = %self.source.describe(), "fetching releases");
        let report = fetch_and_publish(&self.source, &self.file, &self.options).await?;
        tracing::info!(
            dataset = %self.name,
            pages = report.pages,
            accepted = report.accepted,
            skipped = report.skipped,
            bytes = report.bytes,
            "published snapshot"
        );
        *self.last_report.lock().unwrap_or_else(|p| p.into_inner()) = Some(report);
        Ok(())
    }

    async fn reload_from_file(&self) -> Result<()> {
        let path = self.file.clone();
        let snapshot = tokio::task::spawn_blocking(move || read_snapshot(path))
            .await
            .map_err(|e| SyncError::Persistence(format!("reload task failed: {}", e)))??;

        tracing::info!(
            dataset = %self.name,
            releases = snapshot.len(),
            groups = snapshot.group_count(),
            "snapshot loaded"
        );
        self.snapshot.store(snapshot);
        Ok(())
    }
}
