//! Single-writer control loop run by the daemon process.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{error, info};

use crate::status::ServiceStatus;
use crate::store::StatusStore;

use super::bridge::{ControlBridge, ControlRequest};
use super::errors::DaemonError;
use super::{CONTROL_TICK, DAEMON_TARGET, HostedApplication, StartCallback};

/// Destination for the daemon's own status transitions.
pub trait StatusSink {
    /// Publishes `status`; failures must not interrupt the daemon.
    fn report(&self, status: ServiceStatus);
}

impl StatusSink for StatusStore {
    fn report(&self, status: ServiceStatus) {
        self.record(status);
    }
}

/// Drives the hosted application through start, pause/continue, and stop.
///
/// The loop is the only writer of the status while the daemon runs:
/// `StartPending` → `Running` ⇄ (`PausePending` → `Paused` →
/// `ContinuePending` → `Running`) → `StopPending` → `Stopped`.
pub struct RunLoop<'a> {
    sink: &'a dyn StatusSink,
    bridge: ControlBridge,
    requests: Receiver<ControlRequest>,
    tick: Duration,
}

impl<'a> RunLoop<'a> {
    /// Builds a loop publishing to `sink` and consuming `requests`.
    pub fn new(
        sink: &'a dyn StatusSink,
        bridge: ControlBridge,
        requests: Receiver<ControlRequest>,
    ) -> Self {
        Self {
            sink,
            bridge,
            requests,
            tick: CONTROL_TICK,
        }
    }

    /// Replaces the interval at which the quit flag is polled.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Runs until an abort request arrives or every producer disconnects.
    pub fn run(self, on_start: StartCallback) -> Result<(), DaemonError> {
        self.sink.report(ServiceStatus::StartPending);
        let mut application = match on_start() {
            Ok(application) => application,
            Err(source) => {
                error!(
                    target: DAEMON_TARGET,
                    error = %source,
                    "hosted application failed to start"
                );
                self.sink.report(ServiceStatus::Stopped);
                return Err(DaemonError::Hosted { source });
            }
        };
        self.sink.report(ServiceStatus::Running);
        info!(target: DAEMON_TARGET, "daemon running");

        let mut paused = false;
        while !self.bridge.quit_requested() {
            match self.requests.recv_timeout(self.tick) {
                Ok(ControlRequest::Pause) => {
                    if !paused {
                        self.pause(application.as_mut());
                        paused = true;
                    }
                    self.bridge.complete(ControlRequest::Pause);
                }
                Ok(ControlRequest::Continue) => {
                    if paused {
                        self.resume(application.as_mut());
                        paused = false;
                    }
                    self.bridge.complete(ControlRequest::Continue);
                }
                Ok(ControlRequest::Abort) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        info!(target: DAEMON_TARGET, "daemon stopping");
        self.sink.report(ServiceStatus::StopPending);
        application.shutdown();
        self.sink.report(ServiceStatus::Stopped);
        info!(target: DAEMON_TARGET, "shutdown sequence completed");
        Ok(())
    }

    fn pause(&self, application: &mut dyn HostedApplication) {
        self.sink.report(ServiceStatus::PausePending);
        application.pause();
        self.sink.report(ServiceStatus::Paused);
        info!(target: DAEMON_TARGET, "hosted work paused");
    }

    fn resume(&self, application: &mut dyn HostedApplication) {
        self.sink.report(ServiceStatus::ContinuePending);
        application.resume();
        self.sink.report(ServiceStatus::Running);
        info!(target: DAEMON_TARGET, "hosted work resumed");
    }
}
