//! The in-process daemon: hosted-application wiring and the control loop
//! that keeps the reported status truthful while the service runs.

use std::time::Duration;

mod bridge;
#[cfg(unix)]
mod daemonizer;
mod errors;
mod run_loop;
#[cfg(unix)]
pub(crate) mod signals;

pub use bridge::{ControlBridge, ControlRequest};
#[cfg(unix)]
pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use errors::{DaemonError, HostedError};
pub use run_loop::{RunLoop, StatusSink};

pub(crate) const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");
pub(crate) const CONTROL_TICK: Duration = Duration::from_millis(100);

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached; the service manager supervises the process directly.
    Foreground,
}

/// Work hosted by the daemon between start and shutdown.
pub trait HostedApplication: Send {
    /// Suspends hosted work in response to a pause request.
    fn pause(&mut self);

    /// Resumes hosted work after a pause.
    fn resume(&mut self);

    /// Tears the hosted work down; called exactly once.
    fn shutdown(self: Box<Self>);
}

/// Builds the hosted application once the daemon has reported
/// `StartPending`.
pub type StartCallback =
    Box<dyn FnOnce() -> Result<Box<dyn HostedApplication>, HostedError> + Send>;
