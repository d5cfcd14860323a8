//! Virtual clock advanced only by `sleep`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::Clock;

/// Clock whose time moves only when a caller sleeps.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }
}

impl ManualClock {
    /// Virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().expect("clock mutex poisoned")
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("clock mutex poisoned").clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        *self.offset.lock().expect("clock mutex poisoned") += duration;
        self.sleeps
            .lock()
            .expect("clock mutex poisoned")
            .push(duration);
    }
}
