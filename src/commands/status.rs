//! Implementation of the `snapsync status` command.
//!
//! Displays, per dataset, whether a snapshot is published, when it was
//! last updated, how many releases it holds, and which locks are held.

use super::lock::collect_locks;
use crate::config::Config;
use crate::error::Result;
use crate::locks::LockInfo;
use crate::releases;
use chrono::{DateTime, Utc};

/// State of a dataset's published snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SnapshotStatus {
    Missing,
    Present {
        last_updated: Option<DateTime<Utc>>,
        releases: usize,
        groups: usize,
    },
    Unreadable(String),
}

#[derive(Debug, Clone)]
pub(crate) struct DatasetStatus {
    pub name: String,
    pub snapshot: SnapshotStatus,
    pub locks: Vec<LockInfo>,
}

pub(crate) fn collect(config: &Config) -> Result<Vec<DatasetStatus>> {
    let mut held = collect_locks(config, None)?.into_iter();
    let mut statuses = Vec::with_capacity(config.datasets.len());

    for ds in &config.datasets {
        let paths = config.paths_for(ds);
        let snapshot = if !paths.file.exists() {
            SnapshotStatus::Missing
        } else {
            match releases::read_snapshot(&paths.file) {
                Ok(snap) => SnapshotStatus::Present {
                    last_updated: snap.last_updated,
                    releases: snap.len(),
                    groups: snap.group_count(),
                },
                Err(e) => SnapshotStatus::Unreadable(e.to_string()),
            }
        };
        let locks = held.next().map(|(_, l)| l).unwrap_or_default();

        statuses.push(DatasetStatus {
            name: ds.name.clone(),
            snapshot,
            locks,
        });
    }

    Ok(statuses)
}

pub(crate) fn cmd_status(config: &Config) -> Result<()> {
    let statuses = collect(config)?;

    println!("Dataset Status");
    println!("==============");
    println!();

    if statuses.is_empty() {
        println!("No datasets configured.");
        return Ok(());
    }

    for status in &statuses {
        println!("{}:", status.name);
        match &status.snapshot {
            SnapshotStatus::Missing => println!("  Snapshot:   none"),
            SnapshotStatus::Present {
                last_updated,
                releases,
                groups,
            } => {
                println!(
                    "  Snapshot:   {} releases in {} groups",
                    releases, groups
                );
                if let Some(ts) = last_updated {
                    println!("  Updated:    {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            SnapshotStatus::Unreadable(reason) => println!("  Snapshot:   UNREADABLE ({})", reason),
        }
        if status.locks.is_empty() {
            println!("  Locks:      none");
        } else {
            for lock in &status.locks {
                println!("  Lock:       {}", lock);
            }
        }
        println!();
    }

    Ok(())
}
