//! Windows Service Control Manager backend.
//!
//! The SCM tracks status and pause/continue natively, so there is no status
//! file: queries read the SCM and the daemon reports through its status
//! handle.

use std::ffi::{OsStr, OsString};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use servicehost_config::Config;
use tracing::{error, info, warn};
use windows_service::service::{
    Service, ServiceAccess, ServiceAction, ServiceActionType, ServiceControl,
    ServiceControlAccept, ServiceErrorControl, ServiceExitCode, ServiceFailureActions,
    ServiceFailureResetPeriod, ServiceInfo, ServiceStartType, ServiceState, ServiceType,
};
use windows_service::service_control_handler::{
    self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};
use windows_service::{define_windows_service, service_dispatcher};

use crate::daemon::{
    ControlBridge, ControlRequest, DaemonError, LaunchMode, RunLoop, StartCallback, StatusSink,
};
use crate::definition::ServiceDefinition;
use crate::error::NativeError;
use crate::factory::HostKind;
use crate::lifecycle::NativeBackend;
use crate::status::ServiceStatus;
use crate::store::StatusRecord;

const WIN32_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::windows");
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const PENDING_WAIT_HINT: Duration = Duration::from_secs(10);

/// SCM configuration applied once at install time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// Start after the other auto-start services.
    pub delayed_auto_start: bool,
    /// Number of restart actions in the failure table; 0 disables it.
    pub restart_attempts: u32,
    /// Delay before each restart.
    pub restart_delay: Duration,
    /// Quiet period after which the failure count resets.
    pub failure_reset: Duration,
}

impl From<&Config> for InstallOptions {
    fn from(config: &Config) -> Self {
        Self {
            delayed_auto_start: config.delayed_auto_start,
            restart_attempts: config.restart_attempts,
            restart_delay: config.restart_delay(),
            failure_reset: config.failure_reset(),
        }
    }
}

/// [`NativeBackend`] over the Service Control Manager.
#[derive(Debug)]
pub struct Win32Backend {
    definition: ServiceDefinition,
    options: InstallOptions,
}

impl Win32Backend {
    /// Builds a backend for `definition`.
    #[must_use]
    pub fn new(definition: ServiceDefinition, options: InstallOptions) -> Self {
        Self {
            definition,
            options,
        }
    }

    fn manager(access: ServiceManagerAccess) -> Result<ServiceManager, NativeError> {
        ServiceManager::local_computer(None::<&str>, access).map_err(scm("OpenSCManager"))
    }

    fn open(&self, access: ServiceAccess) -> Result<Service, NativeError> {
        Self::manager(ServiceManagerAccess::CONNECT)?
            .open_service(self.definition.name(), access)
            .map_err(scm("OpenService"))
    }

    fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            name: OsString::from(self.definition.name()),
            display_name: OsString::from(self.definition.display_name()),
            service_type: ServiceType::OWN_PROCESS,
            start_type: ServiceStartType::AutoStart,
            error_control: ServiceErrorControl::Normal,
            executable_path: self.definition.executable().to_path_buf(),
            launch_arguments: self
                .definition
                .daemon_arguments(&[])
                .into_iter()
                .map(OsString::from)
                .collect(),
            dependencies: Vec::new(),
            account_name: self.definition.user().map(OsString::from),
            account_password: None,
        }
    }

    fn configure(&self, service: &Service) -> Result<(), NativeError> {
        if let Some(description) = self.definition.description() {
            service
                .set_description(description)
                .map_err(scm("ChangeServiceConfig2(description)"))?;
        }
        if self.options.delayed_auto_start {
            service
                .set_delayed_auto_start(true)
                .map_err(scm("ChangeServiceConfig2(delayed auto-start)"))?;
        }
        if self.options.restart_attempts > 0 {
            let actions = (0..self.options.restart_attempts)
                .map(|_| ServiceAction {
                    action_type: ServiceActionType::Restart,
                    delay: self.options.restart_delay,
                })
                .collect();
            service
                .update_failure_actions(ServiceFailureActions {
                    reset_period: ServiceFailureResetPeriod::After(self.options.failure_reset),
                    reboot_msg: None,
                    command: None,
                    actions: Some(actions),
                })
                .map_err(scm("ChangeServiceConfig2(failure actions)"))?;
        }
        Ok(())
    }
}

/// Rights held on the freshly created service.
///
/// Failure actions that restart the service need `START`; `DELETE` lets a
/// failed configuration step remove the registration again.
fn install_access() -> ServiceAccess {
    ServiceAccess::CHANGE_CONFIG
        | ServiceAccess::QUERY_STATUS
        | ServiceAccess::START
        | ServiceAccess::DELETE
}

fn scm(operation: &'static str) -> impl Fn(windows_service::Error) -> NativeError {
    move |source| NativeError::ServiceManager {
        operation,
        message: source.to_string(),
    }
}

fn service_missing(error: &windows_service::Error) -> bool {
    match error {
        windows_service::Error::Winapi(io) => {
            io.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST)
        }
        _ => false,
    }
}

const fn from_scm(state: ServiceState) -> ServiceStatus {
    match state {
        ServiceState::Stopped => ServiceStatus::Stopped,
        ServiceState::StartPending => ServiceStatus::StartPending,
        ServiceState::StopPending => ServiceStatus::StopPending,
        ServiceState::Running => ServiceStatus::Running,
        ServiceState::ContinuePending => ServiceStatus::ContinuePending,
        ServiceState::PausePending => ServiceStatus::PausePending,
        ServiceState::Paused => ServiceStatus::Paused,
    }
}

const fn to_scm(status: ServiceStatus) -> Option<ServiceState> {
    match status {
        ServiceStatus::Stopped => Some(ServiceState::Stopped),
        ServiceStatus::StartPending => Some(ServiceState::StartPending),
        ServiceStatus::StopPending => Some(ServiceState::StopPending),
        ServiceStatus::Running => Some(ServiceState::Running),
        ServiceStatus::ContinuePending => Some(ServiceState::ContinuePending),
        ServiceStatus::PausePending => Some(ServiceState::PausePending),
        ServiceStatus::Paused => Some(ServiceState::Paused),
        ServiceStatus::Unknown | ServiceStatus::NotInstalled => None,
    }
}

impl NativeBackend for Win32Backend {
    fn kind(&self) -> HostKind {
        HostKind::Win32
    }

    fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    fn query(&self) -> StatusRecord {
        let manager = match Self::manager(ServiceManagerAccess::CONNECT) {
            Ok(manager) => manager,
            Err(error) => {
                warn!(target: WIN32_TARGET, error = %error, "status query failed");
                return StatusRecord::unknown();
            }
        };
        let opened = manager.open_service(self.definition.name(), ServiceAccess::QUERY_STATUS);
        let service = match opened {
            Ok(service) => service,
            Err(error) if service_missing(&error) => {
                return StatusRecord::new(ServiceStatus::NotInstalled, 0);
            }
            Err(error) => {
                warn!(target: WIN32_TARGET, error = %error, "status query failed");
                return StatusRecord::unknown();
            }
        };
        match service.query_status() {
            Ok(status) => StatusRecord::new(
                from_scm(status.current_state),
                status.process_id.unwrap_or(0),
            ),
            Err(error) => {
                warn!(target: WIN32_TARGET, error = %error, "status query failed");
                StatusRecord::unknown()
            }
        }
    }

    fn install(&self) -> Result<(), NativeError> {
        let manager =
            Self::manager(ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE)?;
        let service = manager
            .create_service(&self.service_info(), install_access())
            .map_err(scm("CreateService"))?;
        if let Err(error) = self.configure(&service) {
            match service.delete() {
                Ok(()) => info!(
                    target: WIN32_TARGET,
                    service = self.definition.name(),
                    "half-configured service deleted"
                ),
                Err(delete_error) => warn!(
                    target: WIN32_TARGET,
                    service = self.definition.name(),
                    error = %delete_error,
                    "half-configured service not deleted"
                ),
            }
            return Err(error);
        }
        info!(
            target: WIN32_TARGET,
            service = self.definition.name(),
            delayed_auto_start = self.options.delayed_auto_start,
            restart_attempts = self.options.restart_attempts,
            "service registered with the SCM"
        );
        Ok(())
    }

    fn uninstall(&self) -> Result<(), NativeError> {
        self.open(ServiceAccess::DELETE)?
            .delete()
            .map_err(scm("DeleteService"))?;
        info!(
            target: WIN32_TARGET,
            service = self.definition.name(),
            "service deleted from the SCM"
        );
        Ok(())
    }

    fn start(&self) -> Result<(), NativeError> {
        self.open(ServiceAccess::START)?
            .start::<&OsStr>(&[])
            .map_err(scm("StartService"))
    }

    fn stop(&self) -> Result<(), NativeError> {
        self.open(ServiceAccess::STOP)?
            .stop()
            .map(|_| ())
            .map_err(scm("ControlService(stop)"))
    }

    fn pause(&self, _current: &StatusRecord) -> Result<(), NativeError> {
        self.open(ServiceAccess::PAUSE_CONTINUE)?
            .pause()
            .map(|_| ())
            .map_err(scm("ControlService(pause)"))
    }

    fn resume(&self, _current: &StatusRecord) -> Result<(), NativeError> {
        self.open(ServiceAccess::PAUSE_CONTINUE)?
            .resume()
            .map(|_| ())
            .map_err(scm("ControlService(continue)"))
    }

    fn run(&self, _mode: LaunchMode, on_start: StartCallback) -> i32 {
        *lock(&DISPATCH) = Some(Dispatch {
            name: self.definition.name().to_owned(),
            on_start,
        });
        if let Err(source) = service_dispatcher::start(self.definition.name(), ffi_service_main) {
            let error = DaemonError::ServiceManager {
                message: source.to_string(),
            };
            error!(
                target: WIN32_TARGET,
                service = self.definition.name(),
                error = %error,
                "service dispatcher failed"
            );
            return error.exit_code();
        }
        lock(&EXIT_CODE).take().unwrap_or(0)
    }
}

struct Dispatch {
    name: String,
    on_start: StartCallback,
}

static DISPATCH: Mutex<Option<Dispatch>> = Mutex::new(None);
static EXIT_CODE: Mutex<Option<i32>> = Mutex::new(None);

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

define_windows_service!(ffi_service_main, service_main);

fn service_main(_arguments: Vec<OsString>) {
    let Some(dispatch) = lock(&DISPATCH).take() else {
        error!(target: WIN32_TARGET, "service started without a start callback");
        return;
    };
    let code = match serve(&dispatch.name, dispatch.on_start) {
        Ok(()) => 0,
        Err(error) => {
            error!(target: WIN32_TARGET, error = %error, "service run failed");
            error.exit_code()
        }
    };
    *lock(&EXIT_CODE) = Some(code);
}

fn serve(name: &str, on_start: StartCallback) -> Result<(), DaemonError> {
    let (bridge, requests) = ControlBridge::channel();
    let handler_bridge = bridge.clone();
    let handler = move |control| -> ServiceControlHandlerResult {
        let request = match control {
            ServiceControl::Stop | ServiceControl::Shutdown => ControlRequest::Abort,
            ServiceControl::Pause => ControlRequest::Pause,
            ServiceControl::Continue => ControlRequest::Continue,
            ServiceControl::Interrogate => return ServiceControlHandlerResult::NoError,
            _ => return ServiceControlHandlerResult::NotImplemented,
        };
        handler_bridge.deliver(request);
        ServiceControlHandlerResult::NoError
    };
    let handle = service_control_handler::register(name, handler).map_err(|source| {
        DaemonError::ServiceManager {
            message: source.to_string(),
        }
    })?;
    let sink = ScmStatusSink::new(handle);
    RunLoop::new(&sink, bridge, requests).run(on_start)
}

/// Reports run-loop transitions to the SCM.
struct ScmStatusSink {
    handle: ServiceStatusHandle,
    checkpoint: AtomicU32,
}

impl ScmStatusSink {
    fn new(handle: ServiceStatusHandle) -> Self {
        Self {
            handle,
            checkpoint: AtomicU32::new(0),
        }
    }
}

impl StatusSink for ScmStatusSink {
    fn report(&self, status: ServiceStatus) {
        let Some(current_state) = to_scm(status) else {
            return;
        };
        let (controls_accepted, checkpoint, wait_hint) = if status.is_pending() {
            (
                ServiceControlAccept::empty(),
                self.checkpoint.fetch_add(1, Ordering::Relaxed) + 1,
                PENDING_WAIT_HINT,
            )
        } else if status == ServiceStatus::Stopped {
            self.checkpoint.store(0, Ordering::Relaxed);
            (ServiceControlAccept::empty(), 0, Duration::default())
        } else {
            (
                ServiceControlAccept::STOP
                    | ServiceControlAccept::SHUTDOWN
                    | ServiceControlAccept::PAUSE_CONTINUE,
                0,
                Duration::default(),
            )
        };
        let reported = self.handle.set_service_status(windows_service::service::ServiceStatus {
            service_type: ServiceType::OWN_PROCESS,
            current_state,
            controls_accepted,
            exit_code: ServiceExitCode::Win32(0),
            checkpoint,
            wait_hint,
            process_id: None,
        });
        if let Err(error) = reported {
            warn!(
                target: WIN32_TARGET,
                status = %status,
                error = %error,
                "status not reported to the SCM"
            );
        }
    }
}
