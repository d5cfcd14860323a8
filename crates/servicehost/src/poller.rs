//! Bounded waits for the observed status to converge after an OS-level
//! mutation.
//!
//! Both waits sample a status source on a fixed cadence. They are the only
//! place that decides how long a lifecycle verb blocks, and every backend
//! shares them.

use std::sync::Arc;
use std::time::Duration;

use servicehost_config::Config;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::status::ServiceStatus;

const POLLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::poller");

/// Cadence and ceilings applied by the [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimings {
    /// Delay between status samples.
    pub poll_interval: Duration,
    /// Ceiling for [`Poller::wait_for`].
    pub wait_timeout: Duration,
    /// Ceiling for [`Poller::wait_for_while`].
    pub pending_timeout: Duration,
    /// Window during which [`Poller::wait_for_while`] tolerates a state that
    /// is neither the pending state nor accepted, before the pending state
    /// has been observed.
    pub pending_grace: Duration,
}

impl Default for WaitTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            wait_timeout: Duration::from_secs(60),
            pending_timeout: Duration::from_secs(180),
            pending_grace: Duration::from_secs(3),
        }
    }
}

impl From<&Config> for WaitTimings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            wait_timeout: config.wait_timeout(),
            pending_timeout: config.pending_timeout(),
            pending_grace: config.pending_grace(),
        }
    }
}

/// Status convergence waiter.
#[derive(Clone)]
pub struct Poller {
    clock: Arc<dyn Clock>,
    timings: WaitTimings,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Poller")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), WaitTimings::default())
    }
}

impl Poller {
    /// Builds a poller over `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, timings: WaitTimings) -> Self {
        Self { clock, timings }
    }

    /// Timings in effect.
    #[must_use]
    pub const fn timings(&self) -> WaitTimings {
        self.timings
    }

    /// Clock used between samples.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Waits until `read` reports one of `acceptable`.
    ///
    /// Returns at once on `NotInstalled` or `Unknown`, since nothing further
    /// will happen, and returns `Unknown` once the ceiling elapses.
    pub fn wait_for(
        &self,
        mut read: impl FnMut() -> ServiceStatus,
        acceptable: &[ServiceStatus],
    ) -> ServiceStatus {
        let started = self.clock.now();
        loop {
            let status = read();
            let elapsed = self.clock.now().saturating_duration_since(started);
            if status.is_terminal_for_wait() || acceptable.contains(&status) {
                log_converged("wait_for", status, elapsed);
                return status;
            }
            if elapsed >= self.timings.wait_timeout {
                log_timeout("wait_for", status, elapsed);
                return ServiceStatus::Unknown;
            }
            self.clock.sleep(self.timings.poll_interval);
        }
    }

    /// Waits while `read` reports `while_state`, until one of `acceptable`.
    ///
    /// Any other state ends the wait early and is returned as observed: at
    /// once when `while_state` has already been seen, otherwise once the
    /// grace period has elapsed. Returns `Unknown` at the ceiling.
    pub fn wait_for_while(
        &self,
        mut read: impl FnMut() -> ServiceStatus,
        while_state: ServiceStatus,
        acceptable: &[ServiceStatus],
    ) -> ServiceStatus {
        let started = self.clock.now();
        let mut seen_while_state = false;
        loop {
            let status = read();
            let elapsed = self.clock.now().saturating_duration_since(started);
            if status.is_terminal_for_wait() || acceptable.contains(&status) {
                log_converged("wait_for_while", status, elapsed);
                return status;
            }
            if status == while_state {
                seen_while_state = true;
            } else if seen_while_state || elapsed >= self.timings.pending_grace {
                debug!(
                    target: POLLER_TARGET,
                    status = %status,
                    while_state = %while_state,
                    elapsed_ms = elapsed.as_millis(),
                    "left pending state without converging"
                );
                return status;
            }
            if elapsed >= self.timings.pending_timeout {
                log_timeout("wait_for_while", status, elapsed);
                return ServiceStatus::Unknown;
            }
            self.clock.sleep(self.timings.poll_interval);
        }
    }
}

fn log_converged(wait: &'static str, status: ServiceStatus, elapsed: Duration) {
    debug!(
        target: POLLER_TARGET,
        wait,
        status = %status,
        elapsed_ms = elapsed.as_millis(),
        "status converged"
    );
}

fn log_timeout(wait: &'static str, status: ServiceStatus, elapsed: Duration) {
    debug!(
        target: POLLER_TARGET,
        wait,
        last_status = %status,
        elapsed_ms = elapsed.as_millis(),
        "status did not converge before the ceiling"
    );
}
