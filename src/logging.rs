//! Tracing subscriber setup.
//!
//! Log lines go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG`, when set, takes precedence over the configured level.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber.
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = filter_for(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init()
    };
    installed.context("failed to install log subscriber")
}

fn filter_for(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))
}
