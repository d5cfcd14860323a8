//! Process-table access: liveness probes and control signals.

use thiserror::Error;

/// Signals the Unix control protocol sends to a running daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Ask the daemon to suspend its hosted work (`SIGINT`).
    Pause,
    /// Ask the daemon to resume its hosted work (`SIGCONT`).
    Continue,
}

/// Errors raised while signalling another process.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Pid zero would address the whole process group.
    #[error("refusing to signal pid 0")]
    InvalidPid,
    /// The pid does not fit the platform's signed pid type.
    #[error("pid {pid} is out of range")]
    PidOutOfRange {
        /// Offending pid.
        pid: u32,
    },
    /// The kernel rejected the signal.
    #[error("failed to signal pid {pid}: {message}")]
    Delivery {
        /// Target pid.
        pid: u32,
        /// OS error description.
        message: String,
    },
    /// The platform has no signal-based control protocol.
    #[error("process signals are not supported on this platform")]
    Unsupported,
}

/// Abstraction over the OS process table.
pub trait ProcessTable: Send + Sync {
    /// Returns `true` when `pid` names a live process. Pid 0 is never alive.
    fn is_alive(&self, pid: u32) -> bool;

    /// Delivers a control signal to `pid`.
    fn signal(&self, pid: u32, signal: ControlSignal) -> Result<(), SignalError>;
}

impl<T> ProcessTable for std::sync::Arc<T>
where
    T: ProcessTable + ?Sized,
{
    fn is_alive(&self, pid: u32) -> bool {
        (**self).is_alive(pid)
    }

    fn signal(&self, pid: u32, signal: ControlSignal) -> Result<(), SignalError> {
        (**self).signal(pid, signal)
    }
}

/// Process table backed by `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

#[cfg(unix)]
impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;

        let Some(target) = nix_pid(pid) else {
            return false;
        };
        match kill(target, None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn signal(&self, pid: u32, signal: ControlSignal) -> Result<(), SignalError> {
        use nix::sys::signal::{Signal, kill};

        if pid == 0 {
            return Err(SignalError::InvalidPid);
        }
        let target = nix_pid(pid).ok_or(SignalError::PidOutOfRange { pid })?;
        let signal = match signal {
            ControlSignal::Pause => Signal::SIGINT,
            ControlSignal::Continue => Signal::SIGCONT,
        };
        kill(target, signal).map_err(|errno| SignalError::Delivery {
            pid,
            message: errno.to_string(),
        })
    }
}

#[cfg(unix)]
fn nix_pid(pid: u32) -> Option<nix::unistd::Pid> {
    if pid == 0 {
        return None;
    }
    i32::try_from(pid).ok().map(nix::unistd::Pid::from_raw)
}

#[cfg(not(unix))]
impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        pid != 0
    }

    fn signal(&self, _pid: u32, _signal: ControlSignal) -> Result<(), SignalError> {
        Err(SignalError::Unsupported)
    }
}
