//! Snapsync command line entry point.
//!
//! Parses arguments, loads configuration, installs logging, dispatches to
//! the command handler, and maps errors to exit codes.

use snapsync::cli::Cli;
use snapsync::config::Config;
use snapsync::{commands, exit_codes, logging};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    if let Err(err) = logging::init(level, config.log_json) {
        eprintln!("Error: {:#}", err);
        return ExitCode::from(exit_codes::USER_ERROR as u8);
    }

    match commands::dispatch(cli.command, &config).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
