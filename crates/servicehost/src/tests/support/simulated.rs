//! In-memory stand-ins for an init system and the daemon it supervises.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::unix::InitSystem;
use crate::{
    ControlSignal, HostKind, MemoryStatusFile, NativeError, ProcessTable, ServiceDefinition,
    ServiceStatus, SignalError, StatusRecord,
};

/// Simulated host: registration, a process table, and a daemon that writes
/// the status file the way the real run loop does.
#[derive(Debug)]
pub struct SimulatedOs {
    file: MemoryStatusFile,
    registered: AtomicBool,
    alive: Mutex<HashSet<u32>>,
    next_pid: AtomicU32,
    fail_start: AtomicBool,
    hang_start: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl Default for SimulatedOs {
    fn default() -> Self {
        Self {
            file: MemoryStatusFile::new(),
            registered: AtomicBool::new(false),
            alive: Mutex::new(HashSet::new()),
            next_pid: AtomicU32::new(4000),
            fail_start: AtomicBool::new(false),
            hang_start: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl SimulatedOs {
    /// Handle to the shared status file.
    pub fn file(&self) -> MemoryStatusFile {
        self.file.clone()
    }

    /// Makes the native start command fail.
    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Makes the daemon exit during start without reaching `Running`.
    pub fn hang_start(&self) {
        self.hang_start.store(true, Ordering::SeqCst);
    }

    /// Kills the daemon without letting it update the status file.
    pub fn crash(&self) {
        self.alive.lock().expect("alive mutex poisoned").clear();
    }

    /// Native calls issued so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// Pid currently recorded in the status file.
    pub fn recorded_pid(&self) -> u32 {
        self.file
            .raw()
            .map_or(0, |content| StatusRecord::parse(&content).pid)
    }

    fn note(&self, call: &str) {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(call.to_owned());
    }

    fn publish(&self, status: ServiceStatus, pid: u32) {
        self.file
            .set_raw(Some(&StatusRecord::new(status, pid).render()));
    }
}

impl InitSystem for SimulatedOs {
    fn kind(&self) -> HostKind {
        HostKind::Systemd
    }

    fn is_registered(&self, _definition: &ServiceDefinition) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    fn install(&self, _definition: &ServiceDefinition) -> Result<(), NativeError> {
        self.note("install");
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn uninstall(&self, _definition: &ServiceDefinition) -> Result<(), NativeError> {
        self.note("uninstall");
        self.registered.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn start(&self, _definition: &ServiceDefinition) -> Result<(), NativeError> {
        self.note("start");
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(NativeError::ExitStatus {
                command: String::from("systemctl start simulated"),
                code: Some(1),
            });
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        if self.hang_start.load(Ordering::SeqCst) {
            self.publish(ServiceStatus::Stopped, pid);
            return Ok(());
        }
        self.alive.lock().expect("alive mutex poisoned").insert(pid);
        self.publish(ServiceStatus::Running, pid);
        Ok(())
    }

    fn stop(&self, _definition: &ServiceDefinition) -> Result<(), NativeError> {
        self.note("stop");
        let pid = self.recorded_pid();
        self.alive.lock().expect("alive mutex poisoned").remove(&pid);
        self.publish(ServiceStatus::Stopped, pid);
        Ok(())
    }
}

impl ProcessTable for SimulatedOs {
    fn is_alive(&self, pid: u32) -> bool {
        pid != 0 && self.alive.lock().expect("alive mutex poisoned").contains(&pid)
    }

    fn signal(&self, pid: u32, signal: ControlSignal) -> Result<(), SignalError> {
        if !self.is_alive(pid) {
            return Err(SignalError::Delivery {
                pid,
                message: String::from("No such process"),
            });
        }
        self.note(match signal {
            ControlSignal::Pause => "signal pause",
            ControlSignal::Continue => "signal continue",
        });
        let status = match signal {
            ControlSignal::Pause => ServiceStatus::Paused,
            ControlSignal::Continue => ServiceStatus::Running,
        };
        self.publish(status, pid);
        Ok(())
    }
}
