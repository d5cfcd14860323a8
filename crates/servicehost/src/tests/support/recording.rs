//! Recorders for the daemon run loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{HostedApplication, ServiceStatus, StatusSink};

/// Sink capturing every reported transition.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<ServiceStatus>>,
}

impl RecordingSink {
    /// Transitions reported so far.
    pub fn reports(&self) -> Vec<ServiceStatus> {
        self.reports.lock().expect("sink mutex poisoned").clone()
    }

    /// Most recent transition.
    pub fn last(&self) -> Option<ServiceStatus> {
        self.reports().last().copied()
    }
}

impl StatusSink for RecordingSink {
    fn report(&self, status: ServiceStatus) {
        self.reports
            .lock()
            .expect("sink mutex poisoned")
            .push(status);
    }
}

/// Call counts observed by a [`CountingApplication`].
#[derive(Debug, Default)]
pub struct ApplicationCalls {
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl ApplicationCalls {
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// Hosted application that only counts the calls it receives.
#[derive(Debug)]
pub struct CountingApplication {
    calls: Arc<ApplicationCalls>,
}

impl CountingApplication {
    pub fn new(calls: Arc<ApplicationCalls>) -> Self {
        Self { calls }
    }
}

impl HostedApplication for CountingApplication {
    fn pause(&mut self) {
        self.calls.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.calls.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(self: Box<Self>) {
        self.calls.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
