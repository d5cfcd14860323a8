//! Error surface for native service-manager operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::process::SignalError;

/// Failure of an OS-level mutation issued by a backend.
///
/// Lifecycle verbs never propagate these: they are logged and mapped to the
/// matching `*Failed` response.
#[derive(Debug, Error)]
pub enum NativeError {
    /// The init-system tool could not be launched.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The init-system tool exited unsuccessfully.
    #[error("'{command}' exited with status {code:?}")]
    ExitStatus {
        /// Full command line.
        command: String,
        /// Exit code; `None` when terminated by a signal.
        code: Option<i32>,
    },
    /// Writing, removing, or chmod-ing a service artefact failed.
    #[error("failed to update service artefact '{path}': {source}")]
    Artefact {
        /// Artefact path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The running daemon could not be signalled.
    #[error(transparent)]
    Signal(#[from] SignalError),
    /// No live daemon pid is recorded for a signal-based control.
    #[error("no running daemon pid is recorded")]
    NoDaemonPid,
    /// A Service Control Manager call failed.
    #[error("service control manager call '{operation}' failed: {message}")]
    ServiceManager {
        /// SCM operation name.
        operation: &'static str,
        /// OS error description.
        message: String,
    },
    /// The executable path could not be resolved.
    #[error("failed to resolve the service executable: {source}")]
    Executable {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
