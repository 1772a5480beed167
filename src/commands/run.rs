//! Implementation of the `snapsync run` command.

use super::build_controller;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{Result, SyncError};
use crate::locks::LockManager;

/// Initialise every dataset, then keep refreshing until Ctrl-C.
///
/// A dataset whose first load fails keeps running: its retries and periodic
/// refresh are already armed.
pub(crate) async fn cmd_run(config: &Config) -> Result<()> {
    if config.datasets.is_empty() {
        return Err(SyncError::UserError(
            "no datasets configured; add at least one entry under `datasets:`".to_string(),
        ));
    }

    let locks = LockManager::new().with_poll_interval(config.lock_poll_interval());
    let controllers = config
        .datasets
        .iter()
        .map(|ds| build_controller(config, ds, &locks))
        .collect::<Result<Vec<_>>>()?;

    let mut startups = Vec::with_capacity(controllers.len());
    for controller in &controllers {
        let controller = controller.clone();
        startups.push(tokio::spawn(async move {
            let outcome = controller.initialise().await;
            (controller, outcome)
        }));
    }

    for startup in startups {
        match startup.await {
            Ok((controller, Ok(()))) => tracing::info!(
                dataset = controller.dataset().name(),
                state = %controller.state(),
                "dataset ready"
            ),
            Ok((controller, Err(e))) => tracing::error!(
                dataset = controller.dataset().name(),
                error = %e,
                "initial load failed, retry scheduled"
            ),
            Err(e) => tracing::error!(error = %e, "startup task failed"),
        }
    }

    tracing::info!(datasets = controllers.len(), "running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| SyncError::UserError(format!("failed to listen for Ctrl-C: {}", e)))?;

    tracing::info!("shutting down");
    for controller in &controllers {
        controller.shutdown().await;
    }

    Ok(())
}
