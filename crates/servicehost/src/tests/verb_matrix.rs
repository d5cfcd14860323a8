//! Responses of every lifecycle verb from every starting state.

use std::sync::Arc;

use rstest::rstest;

use crate::{
    Lifecycle, Poller, ServiceHost, ServiceResponse, ServiceStatus, ServiceVerb, WaitTimings,
};

use super::support::{ManualClock, ScriptedBackend};

fn host(backend: ScriptedBackend) -> Lifecycle<ScriptedBackend> {
    let poller = Poller::new(Arc::new(ManualClock::default()), WaitTimings::default());
    Lifecycle::new(backend, poller, 10)
}

fn respond(verb: ServiceVerb, backend: ScriptedBackend) -> ServiceResponse {
    host(backend)
        .execute(verb)
        .expect("lifecycle verbs always produce a response")
}

#[rstest]
#[case(ServiceStatus::NotInstalled, ServiceResponse::NotInstalled)]
#[case(ServiceStatus::Stopped, ServiceResponse::Ok)]
#[case(ServiceStatus::StartPending, ServiceResponse::AlreadyStarting)]
#[case(ServiceStatus::StopPending, ServiceResponse::Ok)]
#[case(ServiceStatus::Running, ServiceResponse::AlreadyRunning)]
#[case(ServiceStatus::ContinuePending, ServiceResponse::AlreadyStarting)]
#[case(ServiceStatus::PausePending, ServiceResponse::Ok)]
#[case(ServiceStatus::Paused, ServiceResponse::Ok)]
#[case(ServiceStatus::Unknown, ServiceResponse::Ok)]
fn start(#[case] from: ServiceStatus, #[case] expected: ServiceResponse) {
    assert_eq!(respond(ServiceVerb::Start, ScriptedBackend::new(from)), expected);
}

#[rstest]
#[case(ServiceStatus::NotInstalled, ServiceResponse::NotInstalled)]
#[case(ServiceStatus::Stopped, ServiceResponse::NotRunning)]
#[case(ServiceStatus::StartPending, ServiceResponse::Ok)]
#[case(ServiceStatus::StopPending, ServiceResponse::AlreadyStopping)]
#[case(ServiceStatus::Running, ServiceResponse::Ok)]
#[case(ServiceStatus::ContinuePending, ServiceResponse::Ok)]
#[case(ServiceStatus::PausePending, ServiceResponse::Ok)]
#[case(ServiceStatus::Paused, ServiceResponse::Ok)]
#[case(ServiceStatus::Unknown, ServiceResponse::Ok)]
fn stop(#[case] from: ServiceStatus, #[case] expected: ServiceResponse) {
    assert_eq!(respond(ServiceVerb::Stop, ScriptedBackend::new(from)), expected);
}

#[rstest]
#[case(ServiceStatus::NotInstalled, ServiceResponse::NotInstalled)]
#[case(ServiceStatus::Stopped, ServiceResponse::NotRunning)]
#[case(ServiceStatus::StartPending, ServiceResponse::Ok)]
#[case(ServiceStatus::StopPending, ServiceResponse::NotRunning)]
#[case(ServiceStatus::Running, ServiceResponse::Ok)]
#[case(ServiceStatus::ContinuePending, ServiceResponse::Ok)]
#[case(ServiceStatus::PausePending, ServiceResponse::AlreadyPaused)]
#[case(ServiceStatus::Paused, ServiceResponse::AlreadyPaused)]
#[case(ServiceStatus::Unknown, ServiceResponse::PauseFailed)]
fn pause(#[case] from: ServiceStatus, #[case] expected: ServiceResponse) {
    assert_eq!(respond(ServiceVerb::Pause, ScriptedBackend::new(from)), expected);
}

#[rstest]
#[case(ServiceStatus::NotInstalled, ServiceResponse::NotInstalled)]
#[case(ServiceStatus::Stopped, ServiceResponse::NotRunning)]
#[case(ServiceStatus::StartPending, ServiceResponse::AlreadyRunning)]
#[case(ServiceStatus::StopPending, ServiceResponse::NotRunning)]
#[case(ServiceStatus::Running, ServiceResponse::AlreadyRunning)]
#[case(ServiceStatus::ContinuePending, ServiceResponse::AlreadyRunning)]
#[case(ServiceStatus::PausePending, ServiceResponse::Ok)]
#[case(ServiceStatus::Paused, ServiceResponse::Ok)]
#[case(ServiceStatus::Unknown, ServiceResponse::ContinueFailed)]
fn resume(#[case] from: ServiceStatus, #[case] expected: ServiceResponse) {
    assert_eq!(respond(ServiceVerb::Continue, ScriptedBackend::new(from)), expected);
}

#[rstest]
#[case(ServiceStatus::NotInstalled, ServiceResponse::Ok)]
#[case(ServiceStatus::Stopped, ServiceResponse::AlreadyInstalled)]
#[case(ServiceStatus::Running, ServiceResponse::AlreadyInstalled)]
#[case(ServiceStatus::Paused, ServiceResponse::AlreadyInstalled)]
#[case(ServiceStatus::Unknown, ServiceResponse::AlreadyInstalled)]
fn install(#[case] from: ServiceStatus, #[case] expected: ServiceResponse) {
    assert_eq!(respond(ServiceVerb::Install, ScriptedBackend::new(from)), expected);
}

#[rstest]
#[case(ServiceStatus::NotInstalled, ServiceResponse::NotInstalled)]
#[case(ServiceStatus::Stopped, ServiceResponse::Ok)]
#[case(ServiceStatus::Running, ServiceResponse::Ok)]
#[case(ServiceStatus::Paused, ServiceResponse::Ok)]
#[case(ServiceStatus::StartPending, ServiceResponse::Ok)]
fn uninstall(#[case] from: ServiceStatus, #[case] expected: ServiceResponse) {
    assert_eq!(respond(ServiceVerb::Uninstall, ScriptedBackend::new(from)), expected);
}

#[rstest]
#[case(ServiceVerb::Start, ServiceStatus::Stopped, ServiceResponse::StartFailed)]
#[case(ServiceVerb::Stop, ServiceStatus::Running, ServiceResponse::StopFailed)]
#[case(ServiceVerb::Pause, ServiceStatus::Running, ServiceResponse::PauseFailed)]
#[case(ServiceVerb::Continue, ServiceStatus::Paused, ServiceResponse::ContinueFailed)]
#[case(ServiceVerb::Install, ServiceStatus::NotInstalled, ServiceResponse::InstallFailed)]
#[case(ServiceVerb::Uninstall, ServiceStatus::Stopped, ServiceResponse::UninstallFailed)]
fn native_failures_map_to_verb_failures(
    #[case] verb: ServiceVerb,
    #[case] from: ServiceStatus,
    #[case] expected: ServiceResponse,
) {
    assert_eq!(respond(verb, ScriptedBackend::new(from).failing()), expected);
}

#[rstest]
fn successful_verbs_land_in_their_target_state() {
    let host = host(ScriptedBackend::new(ServiceStatus::NotInstalled));

    assert_eq!(host.install(), ServiceResponse::Ok);
    assert_eq!(host.status(), ServiceStatus::Stopped);
    assert_eq!(host.start(), ServiceResponse::Ok);
    assert_eq!(host.status(), ServiceStatus::Running);
    assert_eq!(host.pause(), ServiceResponse::Ok);
    assert_eq!(host.status(), ServiceStatus::Paused);
    assert_eq!(host.resume(), ServiceResponse::Ok);
    assert_eq!(host.status(), ServiceStatus::Running);
    assert_eq!(host.stop(), ServiceResponse::Ok);
    assert_eq!(host.status(), ServiceStatus::Stopped);
    assert_eq!(host.uninstall(), ServiceResponse::Ok);
    assert_eq!(host.status(), ServiceStatus::NotInstalled);
}

#[rstest]
#[case(ServiceStatus::Running, ServiceStatus::Running)]
#[case(ServiceStatus::Paused, ServiceStatus::Running)]
#[case(ServiceStatus::Stopped, ServiceStatus::Stopped)]
#[case(ServiceStatus::NotInstalled, ServiceStatus::Stopped)]
fn reinstall_restores_the_running_state(
    #[case] from: ServiceStatus,
    #[case] settles_in: ServiceStatus,
) {
    let host = host(ScriptedBackend::new(from));

    assert_eq!(host.execute(ServiceVerb::Reinstall), Some(ServiceResponse::Ok));
    assert_eq!(host.status(), settles_in);
}

#[rstest]
#[case(ServiceStatus::Running, ServiceResponse::Ok)]
#[case(ServiceStatus::Stopped, ServiceResponse::Ok)]
#[case(ServiceStatus::NotInstalled, ServiceResponse::NotInstalled)]
fn restart_stops_then_starts(#[case] from: ServiceStatus, #[case] expected: ServiceResponse) {
    let host = host(ScriptedBackend::new(from));

    assert_eq!(host.execute(ServiceVerb::Restart), Some(expected));
}

#[rstest]
#[case(ServiceVerb::Status)]
#[case(ServiceVerb::Run)]
fn non_lifecycle_verbs_have_no_response(#[case] verb: ServiceVerb) {
    let host = host(ScriptedBackend::new(ServiceStatus::Running));

    assert_eq!(host.execute(verb), None);
}
