//! Command-line surface of `servicectl`.

use clap::{Parser, Subcommand};
use servicehost::ServiceVerb;

/// Installs and controls one long-running service.
#[derive(Parser, Debug)]
#[command(name = "servicectl", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Launch the elevated child without waiting for its result.
    #[arg(long, global = true)]
    pub(crate) no_wait: bool,
    /// Lifecycle verb to execute.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Lifecycle verbs.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Registers the service with the service manager.
    Install,
    /// Stops and unregisters the service.
    Uninstall,
    /// Uninstalls and reinstalls, restoring the running state.
    Reinstall,
    /// Starts the service and waits until it runs.
    Start,
    /// Stops the service and waits until it stops.
    Stop,
    /// Stops then starts the service.
    Restart,
    /// Suspends the hosted work.
    Pause,
    /// Resumes the hosted work.
    Continue,
    /// Prints the current service status.
    Status,
    /// Runs as the daemon; invoked by the service manager.
    Run {
        /// Fork into the background before entering the run loop.
        #[arg(long)]
        detach: bool,
    },
}

impl From<CliCommand> for ServiceVerb {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Install => Self::Install,
            CliCommand::Uninstall => Self::Uninstall,
            CliCommand::Reinstall => Self::Reinstall,
            CliCommand::Start => Self::Start,
            CliCommand::Stop => Self::Stop,
            CliCommand::Restart => Self::Restart,
            CliCommand::Pause => Self::Pause,
            CliCommand::Continue => Self::Continue,
            CliCommand::Status => Self::Status,
            CliCommand::Run { .. } => Self::Run,
        }
    }
}
