//! Poller convergence tests run in virtual time.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use crate::{Poller, ServiceStatus, WaitTimings};

use super::support::ManualClock;

const TICK: Duration = Duration::from_millis(100);

struct Timed {
    clock: Arc<ManualClock>,
    poller: Poller,
}

#[fixture]
fn timed() -> Timed {
    let clock = Arc::new(ManualClock::default());
    let poller = Poller::new(clock.clone(), WaitTimings::default());
    Timed { clock, poller }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(7)]
#[case(25)]
fn wait_for_converges_after_pending_samples(timed: Timed, #[case] pending_samples: u32) {
    let samples = Cell::new(0_u32);
    let read = || {
        let seen = samples.get();
        samples.set(seen + 1);
        if seen < pending_samples {
            ServiceStatus::StartPending
        } else {
            ServiceStatus::Running
        }
    };

    let status = timed.poller.wait_for(read, &[ServiceStatus::Running]);

    assert_eq!(status, ServiceStatus::Running);
    assert_eq!(timed.clock.elapsed(), TICK * pending_samples);
}

#[rstest]
fn wait_for_times_out_as_unknown(timed: Timed) {
    let status = timed
        .poller
        .wait_for(|| ServiceStatus::StartPending, &[ServiceStatus::Running]);

    assert_eq!(status, ServiceStatus::Unknown);
    assert_eq!(timed.clock.elapsed(), Duration::from_secs(60));
}

#[rstest]
#[case(ServiceStatus::NotInstalled)]
#[case(ServiceStatus::Unknown)]
fn wait_for_returns_at_once_when_nothing_will_change(timed: Timed, #[case] observed: ServiceStatus) {
    let status = timed.poller.wait_for(|| observed, &[ServiceStatus::Running]);

    assert_eq!(status, observed);
    assert_eq!(timed.clock.elapsed(), Duration::ZERO);
}

#[rstest]
fn wait_for_while_exits_early_when_the_pending_state_ends(timed: Timed) {
    let clock = timed.clock.clone();
    let read = || {
        if clock.elapsed() < Duration::from_millis(500) {
            ServiceStatus::StartPending
        } else {
            ServiceStatus::Stopped
        }
    };

    let status = timed.poller.wait_for_while(
        read,
        ServiceStatus::StartPending,
        &[ServiceStatus::Running],
    );

    assert_eq!(status, ServiceStatus::Stopped);
    assert_eq!(timed.clock.elapsed(), Duration::from_millis(500));
}

#[rstest]
fn wait_for_while_tolerates_stale_state_for_the_grace_period(timed: Timed) {
    let status = timed.poller.wait_for_while(
        || ServiceStatus::Stopped,
        ServiceStatus::StartPending,
        &[ServiceStatus::Running],
    );

    assert_eq!(status, ServiceStatus::Stopped);
    assert_eq!(timed.clock.elapsed(), Duration::from_secs(3));
}

#[rstest]
fn wait_for_while_accepts_late_pending_state_within_grace(timed: Timed) {
    let clock = timed.clock.clone();
    let read = || match clock.elapsed().as_millis() {
        0..1000 => ServiceStatus::Stopped,
        1000..2000 => ServiceStatus::StartPending,
        _ => ServiceStatus::Running,
    };

    let status = timed.poller.wait_for_while(
        read,
        ServiceStatus::StartPending,
        &[ServiceStatus::Running],
    );

    assert_eq!(status, ServiceStatus::Running);
    assert_eq!(timed.clock.elapsed(), Duration::from_secs(2));
}

#[rstest]
fn wait_for_while_times_out_at_the_pending_ceiling(timed: Timed) {
    let status = timed.poller.wait_for_while(
        || ServiceStatus::StopPending,
        ServiceStatus::StopPending,
        &[ServiceStatus::Stopped],
    );

    assert_eq!(status, ServiceStatus::Unknown);
    assert_eq!(timed.clock.elapsed(), Duration::from_secs(180));
}

#[rstest]
fn configured_timings_replace_the_defaults() {
    let clock = Arc::new(ManualClock::default());
    let timings = WaitTimings {
        poll_interval: Duration::from_millis(10),
        wait_timeout: Duration::from_millis(50),
        ..WaitTimings::default()
    };
    let poller = Poller::new(clock.clone(), timings);

    let status = poller.wait_for(|| ServiceStatus::StopPending, &[ServiceStatus::Stopped]);

    assert_eq!(status, ServiceStatus::Unknown);
    assert_eq!(clock.elapsed(), Duration::from_millis(50));
    assert!(clock.sleeps().iter().all(|sleep| *sleep == Duration::from_millis(10)));
}
