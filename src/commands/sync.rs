//! Implementation of the `snapsync sync` command.
//!
//! Runs a single locked sync without arming any timers. If another worker
//! publishes while this one waits for the lock, nothing is fetched.

use super::build_controller;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::locks::{LockManager, LockOutcome};

pub(crate) async fn cmd_sync(config: &Config, dataset: &str) -> Result<()> {
    let ds = config.dataset(dataset)?;
    let locks = LockManager::new().with_poll_interval(config.lock_poll_interval());
    let controller = build_controller(config, ds, &locks)?;

    match controller.sync_once().await? {
        LockOutcome::Ran(()) => match controller.dataset().last_report() {
            Some(report) => println!("Published {}: {}", dataset, report),
            None => println!("Published {}", dataset),
        },
        LockOutcome::Cached => {
            println!(
                "{} was refreshed by another worker; loaded {} releases",
                controller.dataset().name(),
                controller.dataset().len()
            );
        }
    }

    Ok(())
}
