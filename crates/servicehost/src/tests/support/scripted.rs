//! Backend with directly scripted state for the verb matrix.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::daemon::{LaunchMode, StartCallback};
use crate::{HostKind, NativeBackend, NativeError, ServiceDefinition, ServiceStatus, StatusRecord};

/// Backend whose state is set directly and whose native calls jump straight
/// to the target state. A pending state is reported once, then settles.
#[derive(Debug)]
pub struct ScriptedBackend {
    definition: ServiceDefinition,
    state: Mutex<ScriptedState>,
    fail_native: AtomicBool,
}

#[derive(Debug)]
struct ScriptedState {
    status: ServiceStatus,
    pending_seen: bool,
}

impl ScriptedBackend {
    /// Builds a backend currently in `status`.
    pub fn new(status: ServiceStatus) -> Self {
        Self {
            definition: ServiceDefinition::new("scripted", "/usr/bin/scripted"),
            state: Mutex::new(ScriptedState {
                status,
                pending_seen: false,
            }),
            fail_native: AtomicBool::new(false),
        }
    }

    /// Makes every native call fail.
    pub fn failing(self) -> Self {
        self.fail_native.store(true, Ordering::SeqCst);
        self
    }

    fn transition(&self, target: ServiceStatus) -> Result<(), NativeError> {
        if self.fail_native.load(Ordering::SeqCst) {
            return Err(NativeError::NoDaemonPid);
        }
        let mut state = self.state.lock().expect("state mutex poisoned");
        state.status = target;
        state.pending_seen = false;
        Ok(())
    }
}

const fn settled(status: ServiceStatus) -> ServiceStatus {
    match status {
        ServiceStatus::StartPending | ServiceStatus::ContinuePending => ServiceStatus::Running,
        ServiceStatus::StopPending => ServiceStatus::Stopped,
        ServiceStatus::PausePending => ServiceStatus::Paused,
        other => other,
    }
}

impl NativeBackend for ScriptedBackend {
    fn kind(&self) -> HostKind {
        HostKind::Systemd
    }

    fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    fn query(&self) -> StatusRecord {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if state.status.is_pending() {
            if state.pending_seen {
                state.status = settled(state.status);
                state.pending_seen = false;
            } else {
                state.pending_seen = true;
            }
        }
        StatusRecord::new(state.status, 77)
    }

    fn install(&self) -> Result<(), NativeError> {
        self.transition(ServiceStatus::Stopped)
    }

    fn uninstall(&self) -> Result<(), NativeError> {
        self.transition(ServiceStatus::NotInstalled)
    }

    fn start(&self) -> Result<(), NativeError> {
        self.transition(ServiceStatus::Running)
    }

    fn stop(&self) -> Result<(), NativeError> {
        self.transition(ServiceStatus::Stopped)
    }

    fn pause(&self, _current: &StatusRecord) -> Result<(), NativeError> {
        self.transition(ServiceStatus::Paused)
    }

    fn resume(&self, _current: &StatusRecord) -> Result<(), NativeError> {
        self.transition(ServiceStatus::Running)
    }

    fn run(&self, _mode: LaunchMode, _on_start: StartCallback) -> i32 {
        0
    }
}
