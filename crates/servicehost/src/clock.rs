//! Time source used by the poller and status-file retries.

use std::thread;
use std::time::{Duration, Instant};

/// Abstraction over the monotonic clock so waits can run in virtual time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Blocks the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Clock backed by [`Instant::now`] and [`thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<T> Clock for std::sync::Arc<T>
where
    T: Clock + ?Sized,
{
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}
