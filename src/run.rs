//! Daemon execution logic.
//!
//! Wires the monitoring engine to the outside world: service-manager
//! notifications, logging, and the per-update child process with its
//! `IPMON_*` environment and optional JSON on stdin.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::signal;

use ipmon::monitor::{self, MonitorError, Update, UpdateHandler};
use ipmon::notify::{Notifier, ServiceState};

use crate::cli::Cli;

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// The command launched for every update.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChildCommand {
    program: String,
    args: Vec<String>,
}

impl ChildCommand {
    fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

/// Update handler of the daemon: notifies readiness once, logs every
/// update, and runs the configured command.
struct UpdateAction {
    notifier: Notifier,
    command: Option<ChildCommand>,
    json: bool,
    ready: bool,
}

impl UpdateHandler for UpdateAction {
    async fn handle(&mut self, update: Update) {
        if !self.ready {
            self.notifier
                .send(&ServiceState::Status("Running".to_string()));
            self.notifier.send(&ServiceState::Ready);
            self.ready = true;
        }

        tracing::info!(
            "Update: {} {:?} {:?} Link[{}]",
            update.kind.label(),
            update.changes(),
            update.address(),
            update.link(),
        );

        if let Some(command) = &self.command {
            if let Err(error) = run_command(command, &update, self.json).await {
                tracing::error!("{error}");
            }
        }
    }
}

/// Executes the monitoring loop until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error only when the kernel subscriptions cannot be
/// established; child process and notification failures are logged and do
/// not stop the loop.
///
/// Excluded from coverage - requires netlink sockets and signal handling.
#[cfg(not(tarpaulin_include))]
pub async fn execute(cli: Cli) -> Result<(), MonitorError> {
    let mut notifier = Notifier::from_env();
    notifier.send(&ServiceState::Status("Starting".to_string()));

    let interval = (cli.interval > 0).then(|| Duration::from_secs(cli.interval));
    let mut action = UpdateAction {
        notifier,
        command: ChildCommand::from_argv(&cli.command),
        json: cli.json,
        ready: false,
    };

    let result = monitor::monitor(shutdown_signal(), interval, &mut action).await;
    action.notifier.send(&ServiceState::Stopping);
    result
}

/// Runs the configured command once for an update.
///
/// The child inherits the daemon's environment minus `NOTIFY_SOCKET`, plus
/// the update's `IPMON_*` variables. With `json` set, the update is also
/// written to the child's stdin.
async fn run_command(command: &ChildCommand, update: &Update, json: bool) -> std::io::Result<()> {
    let environment = ipmon::env::marshal(update);

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .env_remove("NOTIFY_SOCKET")
        .envs(environment.iter().filter_map(|pair| pair.split_once('=')))
        .stdin(if json { Stdio::piped() } else { Stdio::null() })
        .spawn()?;

    if json {
        if let Some(mut stdin) = child.stdin.take() {
            match serde_json::to_vec(update) {
                Ok(payload) => {
                    if let Err(error) = stdin.write_all(&payload).await {
                        tracing::debug!("unable to write update to stdin: {error}");
                    }
                }
                Err(error) => tracing::error!("Unable to encode JSON: {error}"),
            }
            // dropping stdin closes the pipe so the child sees EOF
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        tracing::warn!("command exited with {status}");
    }
    Ok(())
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
