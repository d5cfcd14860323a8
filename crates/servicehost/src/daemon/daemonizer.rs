//! Detaches the daemon from the controlling terminal for SysV init scripts.

use std::ffi::OsStr;
use std::path::Path;

use daemonize_me::Daemon;
use thiserror::Error;
use tracing::info;

use super::DAEMON_TARGET;

/// Strategy for `run --detach`.
pub trait Daemonizer: Send + Sync {
    /// Forks into the background; only the child returns `Ok`.
    fn daemonize(&self, service_name: &str) -> Result<(), DaemonizeError>;
}

/// The service could not be detached.
#[derive(Debug, Error)]
#[error("failed to detach service '{service}': {reason}")]
pub struct DaemonizeError {
    /// Service being detached.
    pub service: String,
    /// Failure reported by `daemonize-me`.
    pub reason: daemonize_me::DaemonError,
}

/// Daemoniser that delegates to `daemonize-me`.
#[derive(Debug, Default)]
pub struct SystemDaemonizer;

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, service_name: &str) -> Result<(), DaemonizeError> {
        info!(
            target: DAEMON_TARGET,
            service = service_name,
            "daemonising into background"
        );
        Daemon::new()
            .work_dir(Path::new("/"))
            .name(OsStr::new(service_name))
            .start()
            .map_err(|reason| DaemonizeError {
                service: service_name.to_owned(),
                reason,
            })?;
        info!(
            target: DAEMON_TARGET,
            service = service_name,
            pid = std::process::id(),
            "detached; run loop continues in the child"
        );
        Ok(())
    }
}
