//! CLI argument parsing for snapsync.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Snapsync: keep large file-backed datasets fresh across many workers.
///
/// Each configured dataset is refreshed from a paginated remote listing:
/// - At most one worker fetches at a time (lock files)
/// - Snapshots are published atomically (staging file + rename)
/// - Failed refreshes are retried with a bounded schedule
#[derive(Parser, Debug)]
#[command(name = "snapsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, short = 'c', global = true, default_value = "snapsync.yaml")]
    pub config: PathBuf,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for snapsync.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Keep every configured dataset in sync until interrupted.
    ///
    /// Loads or fetches each dataset, then refreshes on its interval.
    /// Stops cleanly on Ctrl-C.
    Run,

    /// Run one locked sync of a dataset and print the publish report.
    Sync(SyncArgs),

    /// Print the releases of a group from a dataset's published snapshot.
    Get(GetArgs),

    /// Show snapshot and lock status for every dataset.
    Status,

    /// Lock management commands.
    ///
    /// List or clear dataset sync locks.
    Lock(LockCommand),
}

/// Arguments for the `sync` command.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Dataset name as configured.
    pub dataset: String,
}

/// Arguments for the `get` command.
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Dataset name as configured.
    pub dataset: String,

    /// Group key to look up.
    pub key: String,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List held locks.
    ///
    /// Shows owner, age, and staleness for each lock.
    List(LockListArgs),

    /// Clear a specific lock.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),
}

/// Arguments for the `lock list` command.
#[derive(Parser, Debug)]
pub struct LockListArgs {
    /// Only list locks of this dataset.
    pub dataset: Option<String>,
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Dataset owning the lock.
    pub dataset: String,

    /// Lock name as shown by `lock list`.
    pub name: String,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
