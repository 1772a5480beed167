//! Implementation of the `snapsync lock` commands.

use super::select_datasets;
use crate::cli::LockClearArgs;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::locks::{self, LockInfo};

/// Held locks per dataset, in configuration order.
pub(crate) fn collect_locks(
    config: &Config,
    dataset: Option<&str>,
) -> Result<Vec<(String, Vec<LockInfo>)>> {
    let mut found = Vec::new();
    for ds in select_datasets(config, dataset)? {
        let paths = config.paths_for(ds);
        found.push((ds.name.clone(), locks::list_locks(&paths.locks_dir)?));
    }
    Ok(found)
}

pub(crate) fn cmd_lock_list(config: &Config, dataset: Option<&str>) -> Result<()> {
    let found = collect_locks(config, dataset)?;
    let total: usize = found.iter().map(|(_, l)| l.len()).sum();

    if total == 0 {
        println!("No active locks.");
        return Ok(());
    }

    println!("Active locks ({}):", total);
    println!();

    for (dataset, held) in &found {
        for lock in held {
            println!("  {}/{}:", dataset, lock.name);
            println!("    Owner:      {}", lock.record.owner);
            if let Some(pid) = lock.record.pid {
                println!("    PID:        {}", pid);
            }
            println!(
                "    Acquired:   {}",
                lock.record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            if let Some(renewed) = lock.record.renewed_at {
                println!("    Renewed:    {}", renewed.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!("    Age:        {}", lock.record.age_string());
            if lock.is_stale {
                println!("    Status:     STALE (past {}ms ttl)", lock.record.ttl_ms);
            }
            println!("    Path:       {}", lock.path.display());
            println!();
        }
    }

    let stale_count = found
        .iter()
        .flat_map(|(_, l)| l.iter())
        .filter(|l| l.is_stale)
        .count();
    if stale_count > 0 {
        println!(
            "Note: {} lock(s) are stale. Use `snapsync lock clear <dataset> <name> --force` to clear.",
            stale_count
        );
    }

    Ok(())
}

pub(crate) fn cmd_lock_clear(config: &Config, args: &LockClearArgs) -> Result<()> {
    if !args.force {
        return Err(SyncError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock while its holder is still syncing lets a second worker\n\
             fetch concurrently. Only clear locks whose holder has crashed.\n\n\
             To clear the lock, run:\n  snapsync lock clear {} {} --force",
            args.dataset, args.name
        )));
    }

    let dataset = config.dataset(&args.dataset)?;
    let paths = config.paths_for(dataset);
    let cleared = locks::clear_lock(&paths.locks_dir, &args.name)?;

    tracing::warn!(
        dataset = %args.dataset,
        lock = %cleared.name,
        owner = %cleared.record.owner,
        was_stale = cleared.is_stale,
        "lock cleared by operator"
    );
    println!("Cleared lock: {}", cleared);

    Ok(())
}
