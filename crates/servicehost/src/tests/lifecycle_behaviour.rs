//! Behaviour tests driving the Unix backend against a simulated host.

use std::cell::RefCell;
use std::str::FromStr;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::unix::UnixBackend;
use crate::{
    Lifecycle, Poller, ServiceDefinition, ServiceHost, ServiceResponse, ServiceStatus,
    ServiceVerb, StatusStore, WaitTimings,
};

use super::support::{ManualClock, SimulatedOs};

type SimulatedHost = Lifecycle<UnixBackend<Arc<SimulatedOs>>>;

struct LifecycleWorld {
    os: Arc<SimulatedOs>,
    host: SimulatedHost,
    response: Option<ServiceResponse>,
}

impl LifecycleWorld {
    fn new() -> Self {
        let os = Arc::new(SimulatedOs::default());
        let clock = Arc::new(ManualClock::default());
        let store = StatusStore::new(os.file(), os.clone()).with_clock(clock.clone());
        let backend = UnixBackend::new(
            ServiceDefinition::new("billing", "/opt/billing/bin/billing"),
            os.clone(),
            store,
        );
        let host = Lifecycle::new(backend, Poller::new(clock, WaitTimings::default()), 10);
        Self {
            os,
            host,
            response: None,
        }
    }

    fn expect_ok(&self, verb: ServiceVerb) {
        assert_eq!(self.host.execute(verb), Some(ServiceResponse::Ok), "{verb}");
    }
}

#[fixture]
fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::new())
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches('"')
}

#[given("a simulated Unix host")]
fn given_host(world: &RefCell<LifecycleWorld>) {
    assert_eq!(world.borrow().host.status(), ServiceStatus::NotInstalled);
}

#[given("a simulated Unix host with the service installed")]
fn given_installed(world: &RefCell<LifecycleWorld>) {
    world.borrow().expect_ok(ServiceVerb::Install);
}

#[given("a simulated Unix host with the service running")]
fn given_running(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    world.expect_ok(ServiceVerb::Install);
    world.expect_ok(ServiceVerb::Start);
}

#[given("the daemon exits before it is running")]
fn given_daemon_exits_early(world: &RefCell<LifecycleWorld>) {
    world.borrow().os.hang_start();
}

#[given("the init system refuses to start the service")]
fn given_start_refused(world: &RefCell<LifecycleWorld>) {
    world.borrow().os.fail_start();
}

#[when("the operator runs {verb}")]
fn when_operator_runs(world: &RefCell<LifecycleWorld>, verb: String) {
    let verb = ServiceVerb::from_str(strip_quotes(&verb)).expect("verb should parse");
    let mut world = world.borrow_mut();
    let response = world.host.execute(verb);
    assert!(response.is_some(), "{verb} should produce a response");
    world.response = response;
}

#[when("the daemon dies without updating its status")]
fn when_daemon_dies(world: &RefCell<LifecycleWorld>) {
    world.borrow().os.crash();
}

#[then("the response is {expected}")]
fn then_response(world: &RefCell<LifecycleWorld>, expected: String) {
    let response = world.borrow().response.expect("a verb should have run");
    assert_eq!(response.to_string(), strip_quotes(&expected));
}

#[then("the service status is {expected}")]
fn then_status(world: &RefCell<LifecycleWorld>, expected: String) {
    let expected = ServiceStatus::from_str(strip_quotes(&expected)).expect("status should parse");
    assert_eq!(world.borrow().host.status(), expected);
}

#[then("the init system started the service {count} time(s)")]
fn then_start_count(world: &RefCell<LifecycleWorld>, count: usize) {
    let starts = world
        .borrow()
        .os
        .calls()
        .iter()
        .filter(|call| *call == "start")
        .count();
    assert_eq!(starts, count);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "A service moves through its whole lifecycle"
)]
fn full_lifecycle(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "Repeated verbs answer idempotently"
)]
fn repeated_verbs(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "A crashed daemon heals to stopped"
)]
fn crashed_daemon(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "A daemon that exits during start fails the start"
)]
fn daemon_exits_during_start(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "A refused start command fails the start"
)]
fn refused_start(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "Restart and reinstall keep the service running"
)]
fn restart_and_reinstall(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "Verbs on a missing service report it as not installed"
)]
fn missing_service(world: RefCell<LifecycleWorld>) {
    drop(world);
}
