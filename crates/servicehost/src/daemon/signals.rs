//! Translates POSIX signals into control requests.
//!
//! `SIGINT` pauses and `SIGCONT` resumes the hosted work; `SIGHUP`, `SIGQUIT`
//! and `SIGTERM` stop the daemon. Handlers only touch the bridge, the run loop
//! does the work.

use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGCONT, SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Handle;
use signal_hook::iterator::Signals;
use tracing::{debug, info};

use super::DAEMON_TARGET;
use super::bridge::{ControlBridge, ControlRequest};
use super::errors::DaemonError;

const FORWARDED: [i32; 5] = [SIGINT, SIGCONT, SIGHUP, SIGQUIT, SIGTERM];

/// Maps a received signal onto the request it stands for.
pub(crate) const fn request_for(signal: i32) -> Option<ControlRequest> {
    match signal {
        SIGINT => Some(ControlRequest::Pause),
        SIGCONT => Some(ControlRequest::Continue),
        SIGHUP | SIGQUIT | SIGTERM => Some(ControlRequest::Abort),
        _ => None,
    }
}

/// Background thread forwarding signals into a [`ControlBridge`].
///
/// Dropping the forwarder unregisters the handlers and joins the thread.
pub(crate) struct SignalForwarder {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalForwarder {
    /// Registers the handlers and starts forwarding.
    pub(crate) fn install(bridge: ControlBridge) -> Result<Self, DaemonError> {
        let mut signals =
            Signals::new(FORWARDED).map_err(|source| DaemonError::Signals { source })?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name(String::from("servicehost-signals"))
            .spawn(move || {
                for signal in signals.forever() {
                    let Some(request) = request_for(signal) else {
                        continue;
                    };
                    info!(target: DAEMON_TARGET, signal, ?request, "control signal received");
                    if !bridge.deliver(request) {
                        debug!(target: DAEMON_TARGET, signal, "control signal coalesced");
                    }
                }
            })
            .map_err(|source| DaemonError::Signals { source })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
