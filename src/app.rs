//! Application startup utilities.
//!
//! This module contains exit codes and tracing setup supporting the main
//! entry point.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Application exit codes.
pub mod exit_code {
    use std::process::ExitCode;

    /// Success (exit code 0).
    pub const SUCCESS: ExitCode = ExitCode::SUCCESS;

    /// Runtime error (exit code 2) - subscription failure, socket error, etc.
    ///
    /// Note: This is a function rather than a constant because `ExitCode::from()` is not `const fn`.
    pub fn runtime_error() -> ExitCode {
        ExitCode::from(2)
    }
}

/// Sets up the tracing subscriber for logging.
///
/// Debug logging is enabled by the `-d` flag or by `DEBUG=1` in the
/// environment; `RUST_LOG` overrides both.
pub fn setup_tracing(debug: bool) {
    let debug = debug || std::env::var("DEBUG").is_ok_and(|value| value == "1");
    let level = if debug { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
