//! IPMON: Linux network-state monitor
//!
//! Entry point for the ipmond daemon.

use std::process::ExitCode;

mod app;
mod cli;
mod run;

use app::{exit_code, setup_tracing};
use cli::Cli;

/// Main entry point.
///
/// Excluded from coverage as it's the thin wrapper around testable components.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();
    setup_tracing(cli.debug);

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    match runtime.block_on(run::execute(cli)) {
        Ok(()) => exit_code::SUCCESS,
        Err(error) => {
            tracing::error!("Error while monitoring: {error}");
            exit_code::runtime_error()
        }
    }
}
