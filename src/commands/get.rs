//! Implementation of the `snapsync get` command.

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::releases::{self, Release};

/// Releases of `key` in the published snapshot of `dataset`.
pub(crate) fn lookup(config: &Config, dataset: &str, key: &str) -> Result<Vec<Release>> {
    let ds = config.dataset(dataset)?;
    let paths = config.paths_for(ds);

    if !paths.file.exists() {
        return Err(SyncError::UserError(format!(
            "dataset '{}' has no snapshot at {} (run `snapsync sync {}` first)",
            dataset,
            paths.file.display(),
            dataset
        )));
    }

    let snapshot = releases::read_snapshot(&paths.file)?;
    Ok(snapshot.get(key).to_vec())
}

pub(crate) fn cmd_get(config: &Config, dataset: &str, key: &str) -> Result<()> {
    let found = lookup(config, dataset, key)?;
    let json = serde_json::to_string_pretty(&found)
        .map_err(|e| SyncError::Persistence(format!("failed to encode releases: {}", e)))?;
    println!("{}", json);
    Ok(())
}
