//! Shared adapter for the Unix init systems.
//!
//! Neither systemd nor SysV init can pause a service or report a pid-accurate
//! status for it, so both drive the same protocol: the daemon publishes its
//! state to the status file and control commands talk to it with signals.
//! The init systems differ only in how the service artefact is generated and
//! how the native start and stop are issued, which is what [`InitSystem`]
//! captures.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::daemon::signals::SignalForwarder;
use crate::daemon::{
    ControlBridge, DaemonError, Daemonizer, LaunchMode, RunLoop, StartCallback, SystemDaemonizer,
};
use crate::definition::ServiceDefinition;
use crate::error::NativeError;
use crate::factory::HostKind;
use crate::lifecycle::NativeBackend;
use crate::process::ControlSignal;
use crate::status::ServiceStatus;
use crate::store::{StatusRecord, StatusStore};

mod command;
mod systemd;
mod sysvinit;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use systemd::Systemd;
pub use sysvinit::SysVInit;

pub(crate) const UNIX_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::unix");

/// Artefact generation and native start/stop for one init system.
pub trait InitSystem: Send + Sync {
    /// Service manager this init system represents.
    fn kind(&self) -> HostKind;

    /// Returns `true` when the service artefact exists.
    fn is_registered(&self, definition: &ServiceDefinition) -> bool;

    /// Writes and registers the service artefact.
    fn install(&self, definition: &ServiceDefinition) -> Result<(), NativeError>;

    /// Unregisters and deletes the service artefact.
    fn uninstall(&self, definition: &ServiceDefinition) -> Result<(), NativeError>;

    /// Asks the init system to start the service.
    fn start(&self, definition: &ServiceDefinition) -> Result<(), NativeError>;

    /// Asks the init system to stop the service.
    fn stop(&self, definition: &ServiceDefinition) -> Result<(), NativeError>;
}

impl<T> InitSystem for Arc<T>
where
    T: InitSystem + ?Sized,
{
    fn kind(&self) -> HostKind {
        (**self).kind()
    }

    fn is_registered(&self, definition: &ServiceDefinition) -> bool {
        (**self).is_registered(definition)
    }

    fn install(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        (**self).install(definition)
    }

    fn uninstall(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        (**self).uninstall(definition)
    }

    fn start(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        (**self).start(definition)
    }

    fn stop(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        (**self).stop(definition)
    }
}

/// [`NativeBackend`] over an [`InitSystem`], the status file, and signals.
pub struct UnixBackend<I> {
    definition: ServiceDefinition,
    init: I,
    store: StatusStore,
    daemonizer: Arc<dyn Daemonizer>,
}

impl<I: InitSystem> UnixBackend<I> {
    /// Builds a backend for `definition`.
    pub fn new(definition: ServiceDefinition, init: I, store: StatusStore) -> Self {
        Self {
            definition,
            init,
            store,
            daemonizer: Arc::new(SystemDaemonizer),
        }
    }

    /// Replaces the strategy used to detach in [`LaunchMode::Background`].
    #[must_use]
    pub fn with_daemonizer(mut self, daemonizer: Arc<dyn Daemonizer>) -> Self {
        self.daemonizer = daemonizer;
        self
    }

    /// The wrapped init system.
    pub fn init_system(&self) -> &I {
        &self.init
    }

    /// The status store shared with the daemon.
    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    fn signal_daemon(
        &self,
        current: &StatusRecord,
        signal: ControlSignal,
    ) -> Result<(), NativeError> {
        if current.pid == 0 {
            return Err(NativeError::NoDaemonPid);
        }
        self.store.processes().signal(current.pid, signal)?;
        info!(
            target: UNIX_TARGET,
            service = self.definition.name(),
            pid = current.pid,
            signal = ?signal,
            "control signal sent"
        );
        Ok(())
    }

    fn run_daemon(&self, mode: LaunchMode, on_start: StartCallback) -> Result<(), DaemonError> {
        if mode == LaunchMode::Background {
            self.daemonizer.daemonize(self.definition.name())?;
        }
        let (bridge, requests) = ControlBridge::channel();
        let _forwarder = SignalForwarder::install(bridge.clone())?;
        RunLoop::new(&self.store, bridge, requests).run(on_start)
    }
}

impl<I: InitSystem> NativeBackend for UnixBackend<I> {
    fn kind(&self) -> HostKind {
        self.init.kind()
    }

    fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    fn query(&self) -> StatusRecord {
        match self.store.read_status() {
            Some(record) => record,
            None if self.init.is_registered(&self.definition) => {
                StatusRecord::new(ServiceStatus::Stopped, 0)
            }
            None => StatusRecord::new(ServiceStatus::NotInstalled, 0),
        }
    }

    fn install(&self) -> Result<(), NativeError> {
        self.init.install(&self.definition)?;
        self.store.record(ServiceStatus::Stopped);
        info!(
            target: UNIX_TARGET,
            service = self.definition.name(),
            host = %self.init.kind(),
            "service installed"
        );
        Ok(())
    }

    fn uninstall(&self) -> Result<(), NativeError> {
        self.init.uninstall(&self.definition)?;
        if let Err(error) = self.store.clear() {
            warn!(
                target: UNIX_TARGET,
                service = self.definition.name(),
                error = %error,
                "status file not removed"
            );
        }
        info!(
            target: UNIX_TARGET,
            service = self.definition.name(),
            host = %self.init.kind(),
            "service uninstalled"
        );
        Ok(())
    }

    fn start(&self) -> Result<(), NativeError> {
        self.init.start(&self.definition)
    }

    fn stop(&self) -> Result<(), NativeError> {
        self.init.stop(&self.definition)
    }

    fn pause(&self, current: &StatusRecord) -> Result<(), NativeError> {
        self.signal_daemon(current, ControlSignal::Pause)
    }

    fn resume(&self, current: &StatusRecord) -> Result<(), NativeError> {
        self.signal_daemon(current, ControlSignal::Continue)
    }

    fn run(&self, mode: LaunchMode, on_start: StartCallback) -> i32 {
        match self.run_daemon(mode, on_start) {
            Ok(()) => 0,
            Err(error) => {
                error!(
                    target: UNIX_TARGET,
                    service = self.definition.name(),
                    error = %error,
                    "daemon run failed"
                );
                error.exit_code()
            }
        }
    }
}

impl<I> std::fmt::Debug for UnixBackend<I> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UnixBackend")
            .field("definition", &self.definition)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Removes an artefact left behind by a failed install so a retry starts
/// from an unregistered service.
pub(crate) fn discard_artefact(path: &Path) {
    match std::fs::remove_file(path) {
        Err(error) if error.kind() != std::io::ErrorKind::NotFound => {
            warn!(
                target: UNIX_TARGET,
                path = %path.display(),
                error = %error,
                "artefact from failed install not removed"
            );
        }
        _ => {
            info!(target: UNIX_TARGET, path = %path.display(), "install rolled back");
        }
    }
}

/// Joins a launch command for a systemd `ExecStart=` line.
///
/// `%` specifiers are escaped and words containing whitespace, quotes or
/// backslashes are double-quoted.
pub(crate) fn systemd_command(definition: &ServiceDefinition, extra: &[&str]) -> String {
    command_words(definition, extra)
        .iter()
        .map(|word| {
            let word = word.replace('%', "%%");
            let needs_quotes = word.is_empty()
                || word
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '\''));
            if needs_quotes {
                format!("\"{}\"", word.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Joins a launch command for a POSIX shell, single-quoting every word that
/// is not made of plain characters.
pub(crate) fn shell_command(definition: &ServiceDefinition, extra: &[&str]) -> String {
    command_words(definition, extra)
        .iter()
        .map(|word| {
            let plain = !word.is_empty()
                && word
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
            if plain {
                word.clone()
            } else {
                format!("'{}'", word.replace('\'', "'\\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn command_words(definition: &ServiceDefinition, extra: &[&str]) -> Vec<String> {
    std::iter::once(definition.executable().display().to_string())
        .chain(definition.daemon_arguments(extra))
        .collect()
}
