//! Process table with a fixed set of live pids.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::{ControlSignal, ProcessTable, SignalError};

/// Process table where only the listed pids are alive.
#[derive(Debug, Default)]
pub struct LiveProcesses {
    alive: HashSet<u32>,
    signals: Mutex<Vec<(u32, ControlSignal)>>,
}

impl LiveProcesses {
    pub fn with(pids: &[u32]) -> Self {
        Self {
            alive: pids.iter().copied().collect(),
            signals: Mutex::new(Vec::new()),
        }
    }

    pub fn signals(&self) -> Vec<(u32, ControlSignal)> {
        self.signals.lock().expect("signal mutex poisoned").clone()
    }
}

impl ProcessTable for LiveProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.contains(&pid)
    }

    fn signal(&self, pid: u32, signal: ControlSignal) -> Result<(), SignalError> {
        self.signals
            .lock()
            .expect("signal mutex poisoned")
            .push((pid, signal));
        Ok(())
    }
}
