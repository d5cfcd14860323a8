//! Cross-platform lifecycle control for one long-running service.
//!
//! A single executable can be installed, started, stopped, paused, resumed,
//! and uninstalled under systemd, SysV init, or the Windows Service Control
//! Manager through one [`ServiceHost`] surface. The [`ServiceHostFactory`]
//! probes the host and selects the backend.
//!
//! Windows tracks service status natively. The Unix backends instead share a
//! status file ([`StatusStore`]) written by the running daemon and drive
//! pause and continue with signals. Every verb re-derives the true state from
//! that file, healing records left behind by a crashed daemon, so control
//! commands issued from independent processes converge.
//!
//! ## Waiting for convergence
//!
//! Mutating verbs block in the [`Poller`] until the observed status reaches
//! the target state. `wait_for` gives up after a minute; `wait_for_while`
//! allows three minutes for a pending transition but returns early once the
//! status leaves the pending state without reaching the target.
//!
//! ## Running as the daemon
//!
//! [`ServiceHost::run`] enters the [`RunLoop`], which publishes each
//! transition and turns control signals or SCM events into
//! [`ControlRequest`]s handled on one thread.

mod clock;
pub mod daemon;
mod definition;
pub mod elevation;
mod error;
mod factory;
mod lifecycle;
mod poller;
mod process;
mod status;
mod store;
pub mod telemetry;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

pub use clock::{Clock, SystemClock};
pub use daemon::{
    ControlBridge, ControlRequest, DaemonError, HostedApplication, HostedError, LaunchMode,
    RunLoop, StartCallback, StatusSink,
};
pub use definition::ServiceDefinition;
pub use elevation::{
    CommandLine, ElevationError, ElevationGate, Elevator, GateOutcome, SystemElevator,
    needs_elevation,
};
pub use error::NativeError;
pub use factory::{FactoryError, HostKind, HostProbe, ServiceHostFactory};
pub use lifecycle::{Lifecycle, NativeBackend, ServiceHost};
pub use poller::{Poller, WaitTimings};
pub use process::{ControlSignal, ProcessTable, SignalError, SystemProcessTable};
pub use status::{ServiceResponse, ServiceStatus, ServiceVerb};
pub use store::{DiskStatusFile, MemoryStatusFile, StatusFile, StatusRecord, StatusStore, StoreError};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
