//! Hands control requests from signal or SCM callbacks to the run loop.
//!
//! Callbacks may run on arbitrary threads and may be redelivered. Each kind
//! of request is guarded by one atomic flag: a callback only enqueues when it
//! wins the compare-and-swap, and the run loop re-arms the flag once it has
//! handled the request. Abort is never re-armed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use tracing::debug;

use super::DAEMON_TARGET;

const QUEUE_DEPTH: usize = 8;

/// Structured request consumed by the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Suspend hosted work.
    Pause,
    /// Resume hosted work.
    Continue,
    /// Stop the daemon.
    Abort,
}

#[derive(Debug, Default)]
struct Flags {
    pausing: AtomicBool,
    resuming: AtomicBool,
    quit: AtomicBool,
}

impl Flags {
    fn for_request(&self, request: ControlRequest) -> &AtomicBool {
        match request {
            ControlRequest::Pause => &self.pausing,
            ControlRequest::Continue => &self.resuming,
            ControlRequest::Abort => &self.quit,
        }
    }
}

/// Producer side shared by signal handlers and SCM control callbacks.
#[derive(Debug, Clone)]
pub struct ControlBridge {
    flags: Arc<Flags>,
    sender: SyncSender<ControlRequest>,
}

impl ControlBridge {
    /// Builds a bridge and the receiver the run loop consumes.
    #[must_use]
    pub fn channel() -> (Self, Receiver<ControlRequest>) {
        let (sender, receiver) = mpsc::sync_channel(QUEUE_DEPTH);
        (
            Self {
                flags: Arc::new(Flags::default()),
                sender,
            },
            receiver,
        )
    }

    /// Enqueues `request` unless an identical one is still outstanding.
    ///
    /// Returns `true` when the request was enqueued.
    pub fn deliver(&self, request: ControlRequest) -> bool {
        let flag = self.flags.for_request(request);
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(
                target: DAEMON_TARGET,
                ?request,
                "duplicate control request ignored"
            );
            return false;
        }
        match self.sender.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                // The quit flag alone is enough for the loop to stop.
                if request != ControlRequest::Abort {
                    flag.store(false, Ordering::Release);
                }
                false
            }
        }
    }

    /// Returns `true` once an abort has been requested.
    #[must_use]
    pub fn quit_requested(&self) -> bool {
        self.flags.quit.load(Ordering::Acquire)
    }

    /// Re-arms the flag for a handled pause or continue request.
    pub fn complete(&self, request: ControlRequest) {
        if request != ControlRequest::Abort {
            self.flags
                .for_request(request)
                .store(false, Ordering::Release);
        }
    }
}
