//! Snapsync: lock-coordinated refresh of large file-backed datasets.
//!
//! Many workers sharing a data directory each keep an in-memory copy of a
//! dataset fetched from a paginated remote listing. The expensive fetch runs
//! in at most one worker at a time ([`locks`]), is published atomically
//! ([`fs`]), and is retried on a bounded schedule ([`dataset`]). Readers only
//! ever see whole snapshots ([`releases::ReleaseIndex::get_releases`]).

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod dataset;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;
pub mod releases;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;
