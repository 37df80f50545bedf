//! CLI argument parsing using clap.

use clap::Parser;

/// ipmond: network-state monitoring daemon
///
/// Watches the kernel for interface, address and route changes and runs a
/// command with `IPMON_*` environment variables describing each update.
#[derive(Debug, Parser)]
#[command(name = "ipmond")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Write each update as JSON to the command's stdin
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Emit a heartbeat update after every SECONDS of quiet (0 disables)
    #[arg(short = 'i', long, value_name = "SECONDS", default_value_t = 0)]
    pub interval: u64,

    /// Command (and arguments) to run for every update
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Parses the process arguments.
    ///
    /// Excluded from coverage as a thin wrapper around clap.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
