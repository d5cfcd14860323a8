//! Hosted application used when `servicectl` itself runs as the daemon.

use servicehost::{HostedApplication, HostedError};
use tracing::info;

const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

/// Keeps the service alive without doing work of its own; pause and resume
/// only mark the transition in the log.
#[derive(Debug, Default)]
pub(crate) struct IdleApplication {
    paused: bool,
}

impl HostedApplication for IdleApplication {
    fn pause(&mut self) {
        self.paused = true;
        info!(target: DAEMON_TARGET, "idle application paused");
    }

    fn resume(&mut self) {
        self.paused = false;
        info!(target: DAEMON_TARGET, "idle application resumed");
    }

    fn shutdown(self: Box<Self>) {
        info!(
            target: DAEMON_TARGET,
            paused = self.paused,
            "idle application shut down"
        );
    }
}

/// Start callback handed to the run loop.
pub(crate) fn idle_application() -> Result<Box<dyn HostedApplication>, HostedError> {
    info!(target: DAEMON_TARGET, "idle application started");
    Ok(Box::new(IdleApplication::default()))
}
