//! Command implementations for snapsync.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations.

mod get;
mod lock;
mod run;
mod status;
mod sync;


use crate::cli::{Command, LockAction};
use crate::config::{Config, DatasetConfig};
use crate::dataset::{SyncController, SyncSettings};
use crate::error::Result;
use crate::locks::LockManager;
use crate::releases::ReleaseIndex;
use crate::source::HttpPagedSource;

/// Dispatch a command to its implementation.
pub async fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Run => run::cmd_run(config).await,
        Command::Sync(args) => sync::cmd_sync(config, &args.dataset).await,
        Command::Get(args) => get::cmd_get(config, &args.dataset, &args.key),
        Command::Status => status::cmd_status(config),
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::List(args) => lock::cmd_lock_list(config, args.dataset.as_deref()),
            LockAction::Clear(args) => lock::cmd_lock_clear(config, &args),
        },
    }
}

/// Controller for one configured release dataset.
pub(crate) fn build_controller(
    config: &Config,
    dataset: &DatasetConfig,
    locks: &LockManager,
) -> Result<SyncController<ReleaseIndex<HttpPagedSource>>> {
    let index = ReleaseIndex::from_config(config, dataset)?;
    Ok(SyncController::new(
        index,
        locks.clone(),
        SyncSettings::for_dataset(config, dataset),
    ))
}

/// Datasets selected by an optional name filter.
pub(crate) fn select_datasets<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<Vec<&'a DatasetConfig>> {
    match name {
        Some(name) => Ok(vec![config.dataset(name)?]),
        None => Ok(config.datasets.iter().collect()),
    }
}
