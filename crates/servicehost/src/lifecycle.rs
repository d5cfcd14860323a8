//! The lifecycle state machine shared by every backend.
//!
//! Each verb first resolves the true current state through the backend's
//! self-healing status query, then either answers idempotently, waits for an
//! in-flight transition, or issues the native primitive and waits for the
//! status to converge. Backends only supply the primitives.

use tracing::{info, warn};

use crate::daemon::{LaunchMode, StartCallback};
use crate::definition::ServiceDefinition;
use crate::error::NativeError;
use crate::factory::HostKind;
use crate::poller::Poller;
use crate::status::{ServiceResponse, ServiceStatus, ServiceVerb};
use crate::store::StatusRecord;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Native primitives a service-manager backend provides.
pub trait NativeBackend: Send + Sync {
    /// Service manager this backend drives.
    fn kind(&self) -> HostKind;

    /// The managed service.
    fn definition(&self) -> &ServiceDefinition;

    /// Current state with its daemon pid; never trusts stale records.
    fn query(&self) -> StatusRecord;

    /// Generates and registers the service artefact.
    fn install(&self) -> Result<(), NativeError>;

    /// Deletes and unregisters the service artefact.
    fn uninstall(&self) -> Result<(), NativeError>;

    /// Asks the service manager to start the service.
    fn start(&self) -> Result<(), NativeError>;

    /// Asks the service manager to stop the service.
    fn stop(&self) -> Result<(), NativeError>;

    /// Asks the running daemon to suspend its hosted work.
    fn pause(&self, current: &StatusRecord) -> Result<(), NativeError>;

    /// Asks the running daemon to resume its hosted work.
    fn resume(&self, current: &StatusRecord) -> Result<(), NativeError>;

    /// Runs this process as the daemon; returns the process exit code.
    fn run(&self, mode: LaunchMode, on_start: StartCallback) -> i32;
}

/// Uniform control surface over the active service manager.
pub trait ServiceHost: Send + Sync {
    /// Service manager in use.
    fn kind(&self) -> HostKind;

    /// The managed service.
    fn definition(&self) -> &ServiceDefinition;

    /// Registers the service.
    fn install(&self) -> ServiceResponse;

    /// Stops and unregisters the service.
    fn uninstall(&self) -> ServiceResponse;

    /// Starts the service and waits for it to run.
    fn start(&self) -> ServiceResponse;

    /// Stops the service and waits for it to stop.
    fn stop(&self) -> ServiceResponse;

    /// Suspends the hosted work.
    fn pause(&self) -> ServiceResponse;

    /// Resumes the hosted work.
    fn resume(&self) -> ServiceResponse;

    /// Reports the current state.
    fn status(&self) -> ServiceStatus;

    /// Runs this process as the daemon.
    fn run(&self, mode: LaunchMode, on_start: StartCallback) -> i32;

    /// Uninstalls then restores the previous state on a fresh install.
    fn reinstall(&self) -> ServiceResponse {
        let previous = self.status();
        if previous != ServiceStatus::NotInstalled {
            let response = self.uninstall();
            if !response.is_success() {
                return response;
            }
        }
        let response = self.install();
        if !response.is_success() {
            return response;
        }
        if was_active(previous) {
            self.start()
        } else {
            response
        }
    }

    /// Stops then starts the service.
    fn restart(&self) -> ServiceResponse {
        let response = self.stop();
        if !response.is_success() {
            return response;
        }
        self.start()
    }

    /// Executes a lifecycle verb; `Status` and `Run` have no response form.
    fn execute(&self, verb: ServiceVerb) -> Option<ServiceResponse> {
        let response = match verb {
            ServiceVerb::Install => self.install(),
            ServiceVerb::Uninstall => self.uninstall(),
            ServiceVerb::Reinstall => self.reinstall(),
            ServiceVerb::Start => self.start(),
            ServiceVerb::Stop => self.stop(),
            ServiceVerb::Restart => self.restart(),
            ServiceVerb::Pause => self.pause(),
            ServiceVerb::Continue => self.resume(),
            ServiceVerb::Status | ServiceVerb::Run => return None,
        };
        info!(
            target: LIFECYCLE_TARGET,
            service = self.definition().name(),
            verb = %verb,
            response = %response,
            "lifecycle verb completed"
        );
        Some(response)
    }
}

const fn was_active(status: ServiceStatus) -> bool {
    matches!(
        status,
        ServiceStatus::Running
            | ServiceStatus::StartPending
            | ServiceStatus::ContinuePending
            | ServiceStatus::PausePending
            | ServiceStatus::Paused
    )
}

/// State machine binding one [`NativeBackend`] to the shared [`Poller`].
#[derive(Debug)]
pub struct Lifecycle<B> {
    backend: B,
    poller: Poller,
    retry_limit: u32,
}

impl<B: NativeBackend> Lifecycle<B> {
    /// Builds the state machine.
    ///
    /// `retry_limit` bounds how often Start and Stop wait out a competing
    /// transition before issuing their own primitive.
    pub fn new(backend: B, poller: Poller, retry_limit: u32) -> Self {
        Self {
            backend,
            poller,
            retry_limit: retry_limit.max(1),
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn current(&self) -> StatusRecord {
        self.backend.query()
    }

    fn observe(&self) -> ServiceStatus {
        self.backend.query().status
    }

    fn wait_for(&self, acceptable: &[ServiceStatus]) -> ServiceStatus {
        self.poller.wait_for(|| self.observe(), acceptable)
    }

    fn wait_for_while(
        &self,
        while_state: ServiceStatus,
        acceptable: &[ServiceStatus],
    ) -> ServiceStatus {
        self.poller
            .wait_for_while(|| self.observe(), while_state, acceptable)
    }

    fn native_failed(&self, verb: ServiceVerb, error: &NativeError) {
        warn!(
            target: LIFECYCLE_TARGET,
            service = self.backend.definition().name(),
            verb = %verb,
            error = %error,
            "native service manager call failed"
        );
    }

    fn issue_start(&self) -> ServiceResponse {
        if let Err(error) = self.backend.start() {
            self.native_failed(ServiceVerb::Start, &error);
            return ServiceResponse::StartFailed;
        }
        match self.wait_for_while(ServiceStatus::StartPending, &[ServiceStatus::Running]) {
            ServiceStatus::Running => ServiceResponse::Ok,
            _ => ServiceResponse::StartFailed,
        }
    }

    fn issue_stop(&self) -> ServiceResponse {
        if let Err(error) = self.backend.stop() {
            self.native_failed(ServiceVerb::Stop, &error);
            return ServiceResponse::StopFailed;
        }
        match self.wait_for_while(ServiceStatus::StopPending, &[ServiceStatus::Stopped]) {
            ServiceStatus::Stopped => ServiceResponse::Ok,
            _ => ServiceResponse::StopFailed,
        }
    }

    fn issue_pause(&self, current: &StatusRecord) -> ServiceResponse {
        if let Err(error) = self.backend.pause(current) {
            self.native_failed(ServiceVerb::Pause, &error);
            return ServiceResponse::PauseFailed;
        }
        match self.wait_for_while(ServiceStatus::PausePending, &[ServiceStatus::Paused]) {
            ServiceStatus::Paused => ServiceResponse::Ok,
            _ => ServiceResponse::PauseFailed,
        }
    }

    fn issue_resume(&self, current: &StatusRecord) -> ServiceResponse {
        if let Err(error) = self.backend.resume(current) {
            self.native_failed(ServiceVerb::Continue, &error);
            return ServiceResponse::ContinueFailed;
        }
        match self.wait_for_while(ServiceStatus::ContinuePending, &[ServiceStatus::Running]) {
            ServiceStatus::Running => ServiceResponse::Ok,
            _ => ServiceResponse::ContinueFailed,
        }
    }
}

impl<B: NativeBackend> ServiceHost for Lifecycle<B> {
    fn kind(&self) -> HostKind {
        self.backend.kind()
    }

    fn definition(&self) -> &ServiceDefinition {
        self.backend.definition()
    }

    fn install(&self) -> ServiceResponse {
        if self.observe() != ServiceStatus::NotInstalled {
            return ServiceResponse::AlreadyInstalled;
        }
        match self.backend.install() {
            Ok(()) => ServiceResponse::Ok,
            Err(error) => {
                self.native_failed(ServiceVerb::Install, &error);
                ServiceResponse::InstallFailed
            }
        }
    }

    fn uninstall(&self) -> ServiceResponse {
        if self.observe() == ServiceStatus::NotInstalled {
            return ServiceResponse::NotInstalled;
        }
        let stopped = self.stop();
        if !stopped.is_success() {
            warn!(
                target: LIFECYCLE_TARGET,
                service = self.backend.definition().name(),
                response = %stopped,
                "service did not stop cleanly; uninstalling anyway"
            );
        }
        match self.backend.uninstall() {
            Ok(()) => ServiceResponse::Ok,
            Err(error) => {
                self.native_failed(ServiceVerb::Uninstall, &error);
                ServiceResponse::UninstallFailed
            }
        }
    }

    fn start(&self) -> ServiceResponse {
        for _ in 0..self.retry_limit {
            match self.observe() {
                ServiceStatus::NotInstalled => return ServiceResponse::NotInstalled,
                ServiceStatus::Running => return ServiceResponse::AlreadyRunning,
                ServiceStatus::StopPending => {
                    self.wait_for(&[ServiceStatus::Stopped]);
                }
                ServiceStatus::Paused | ServiceStatus::PausePending => return self.resume(),
                ServiceStatus::StartPending | ServiceStatus::ContinuePending => {
                    return match self.wait_for(&[ServiceStatus::Running]) {
                        ServiceStatus::Running => ServiceResponse::AlreadyStarting,
                        _ => ServiceResponse::StartFailed,
                    };
                }
                ServiceStatus::Stopped | ServiceStatus::Unknown => return self.issue_start(),
            }
        }
        ServiceResponse::StartFailed
    }

    fn stop(&self) -> ServiceResponse {
        for _ in 0..self.retry_limit {
            match self.observe() {
                ServiceStatus::NotInstalled => return ServiceResponse::NotInstalled,
                ServiceStatus::Stopped => return ServiceResponse::NotRunning,
                ServiceStatus::StopPending => {
                    return match self.wait_for(&[ServiceStatus::Stopped]) {
                        ServiceStatus::Stopped => ServiceResponse::AlreadyStopping,
                        _ => ServiceResponse::StopFailed,
                    };
                }
                ServiceStatus::StartPending | ServiceStatus::ContinuePending => {
                    self.wait_for(&[ServiceStatus::Running]);
                }
                ServiceStatus::PausePending => {
                    self.wait_for(&[ServiceStatus::Paused]);
                }
                ServiceStatus::Running | ServiceStatus::Paused | ServiceStatus::Unknown => {
                    return self.issue_stop();
                }
            }
        }
        ServiceResponse::StopFailed
    }

    fn pause(&self) -> ServiceResponse {
        for _ in 0..self.retry_limit {
            let current = self.current();
            match current.status {
                ServiceStatus::NotInstalled => return ServiceResponse::NotInstalled,
                ServiceStatus::Stopped | ServiceStatus::StopPending => {
                    return ServiceResponse::NotRunning;
                }
                ServiceStatus::Paused => return ServiceResponse::AlreadyPaused,
                ServiceStatus::PausePending => {
                    return match self.wait_for(&[ServiceStatus::Paused]) {
                        ServiceStatus::Paused => ServiceResponse::AlreadyPaused,
                        _ => ServiceResponse::PauseFailed,
                    };
                }
                ServiceStatus::ContinuePending | ServiceStatus::StartPending => {
                    self.wait_for(&[ServiceStatus::Running]);
                }
                ServiceStatus::Running => return self.issue_pause(&current),
                ServiceStatus::Unknown => return ServiceResponse::PauseFailed,
            }
        }
        ServiceResponse::PauseFailed
    }

    fn resume(&self) -> ServiceResponse {
        for _ in 0..self.retry_limit {
            let current = self.current();
            match current.status {
                ServiceStatus::NotInstalled => return ServiceResponse::NotInstalled,
                ServiceStatus::Stopped | ServiceStatus::StopPending => {
                    return ServiceResponse::NotRunning;
                }
                ServiceStatus::Running => return ServiceResponse::AlreadyRunning,
                ServiceStatus::ContinuePending | ServiceStatus::StartPending => {
                    return match self.wait_for(&[ServiceStatus::Running]) {
                        ServiceStatus::Running => ServiceResponse::AlreadyRunning,
                        _ => ServiceResponse::ContinueFailed,
                    };
                }
                ServiceStatus::PausePending => {
                    self.wait_for(&[ServiceStatus::Paused]);
                }
                ServiceStatus::Paused => return self.issue_resume(&current),
                ServiceStatus::Unknown => return ServiceResponse::ContinueFailed,
            }
        }
        ServiceResponse::ContinueFailed
    }

    fn status(&self) -> ServiceStatus {
        self.observe()
    }

    fn run(&self, mode: LaunchMode, on_start: StartCallback) -> i32 {
        self.backend.run(mode, on_start)
    }
}
