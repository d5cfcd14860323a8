//! Administrator-rights gate for lifecycle verbs.
//!
//! Mutating verbs need root on Unix and an elevated token on Windows. When
//! the current process lacks them, the full command line is re-invoked
//! through `sudo` or a UAC prompt and the child's exit code is forwarded.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::info;

use crate::status::{ServiceResponse, ServiceVerb};

const ELEVATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::elevation");

/// Verbs that mutate service-manager state.
pub const ELEVATED_VERBS: [ServiceVerb; 8] = [
    ServiceVerb::Install,
    ServiceVerb::Uninstall,
    ServiceVerb::Reinstall,
    ServiceVerb::Restart,
    ServiceVerb::Start,
    ServiceVerb::Stop,
    ServiceVerb::Pause,
    ServiceVerb::Continue,
];

/// Returns `true` when `verb` requires administrator rights.
#[must_use]
pub fn needs_elevation(verb: ServiceVerb) -> bool {
    ELEVATED_VERBS.contains(&verb)
}

static ELEVATED: OnceCell<bool> = OnceCell::new();

/// Returns `true` when this process already holds administrator rights.
///
/// The check runs once per process.
#[must_use]
pub fn is_elevated() -> bool {
    *ELEVATED.get_or_init(probe_elevation)
}

#[cfg(unix)]
fn probe_elevation() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(windows)]
fn probe_elevation() -> bool {
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::Security::{
        GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation,
    };
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    let mut token: HANDLE = std::ptr::null_mut();
    let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
    let mut returned = 0_u32;
    let size = u32::try_from(std::mem::size_of::<TOKEN_ELEVATION>()).unwrap_or(u32::MAX);
    // SAFETY: the token handle is written by OpenProcessToken and closed
    // before returning; the output buffer is a live TOKEN_ELEVATION of `size`
    // bytes.
    unsafe {
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return false;
        }
        let queried = GetTokenInformation(
            token,
            TokenElevation,
            std::ptr::from_mut(&mut elevation).cast(),
            size,
            &mut returned,
        );
        CloseHandle(token);
        queried != 0 && elevation.TokenIsElevated != 0
    }
}

#[cfg(not(any(unix, windows)))]
fn probe_elevation() -> bool {
    false
}

/// Errors raised while re-invoking a command with elevated rights.
#[derive(Debug, Error)]
pub enum ElevationError {
    /// The escalation tool could not be launched.
    #[error("failed to launch '{program}' for elevation: {source}")]
    Spawn {
        /// Escalation program.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Waiting for the elevated child failed.
    #[error("failed to wait for the elevated command: {source}")]
    Wait {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The elevated child was killed before reporting an exit code.
    #[error("the elevated command terminated without an exit code")]
    Terminated,
}

/// Command line re-invoked under elevation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    arguments: Vec<OsString>,
}

impl CommandLine {
    /// Builds a command line.
    pub fn new(program: impl Into<PathBuf>, arguments: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            arguments,
        }
    }

    /// The running executable with the process arguments, minus `argv[0]`.
    pub fn current() -> io::Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            std::env::args_os().skip(1).collect(),
        ))
    }

    /// Program path.
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Arguments after the program.
    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.arguments
    }
}

/// Platform privilege check and escalation mechanism.
pub trait Elevator: Send + Sync {
    /// Returns `true` when the process already holds administrator rights.
    fn is_elevated(&self) -> bool;

    /// Re-invokes `command` elevated.
    ///
    /// Returns the child's exit code when `wait` is set, `None` otherwise.
    fn relaunch(&self, command: &CommandLine, wait: bool) -> Result<Option<i32>, ElevationError>;
}

impl<T> Elevator for Arc<T>
where
    T: Elevator + ?Sized,
{
    fn is_elevated(&self) -> bool {
        (**self).is_elevated()
    }

    fn relaunch(&self, command: &CommandLine, wait: bool) -> Result<Option<i32>, ElevationError> {
        (**self).relaunch(command, wait)
    }
}

/// Escalates through `sudo` on Unix and a UAC prompt on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemElevator;

impl SystemElevator {
    #[cfg(not(windows))]
    fn escalation(command: &CommandLine, _wait: bool) -> (String, Command) {
        let program = String::from("sudo");
        let mut escalation = Command::new(&program);
        escalation
            .arg("--")
            .arg(command.program())
            .args(command.arguments());
        (program, escalation)
    }

    #[cfg(windows)]
    fn escalation(command: &CommandLine, wait: bool) -> (String, Command) {
        let quote = |text: &str| format!("'{}'", text.replace('\'', "''"));
        let arguments = command
            .arguments()
            .iter()
            .map(|argument| quote(&argument.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(",");
        let mut script = format!(
            "$p = Start-Process -FilePath {} -Verb RunAs",
            quote(&command.program().to_string_lossy())
        );
        if !arguments.is_empty() {
            script.push_str(&format!(" -ArgumentList @({arguments})"));
        }
        if wait {
            script.push_str(" -Wait -PassThru; exit $p.ExitCode");
        }
        let program = String::from("powershell.exe");
        let mut escalation = Command::new(&program);
        escalation.args(["-NoProfile", "-NonInteractive", "-Command", script.as_str()]);
        (program, escalation)
    }
}

impl Elevator for SystemElevator {
    fn is_elevated(&self) -> bool {
        is_elevated()
    }

    fn relaunch(&self, command: &CommandLine, wait: bool) -> Result<Option<i32>, ElevationError> {
        let (program, mut escalation) = Self::escalation(command, wait);
        let mut child = escalation
            .spawn()
            .map_err(|source| ElevationError::Spawn { program, source })?;
        if !wait {
            info!(
                target: ELEVATION_TARGET,
                pid = child.id(),
                "elevated command detached"
            );
            return Ok(None);
        }
        let status = child
            .wait()
            .map_err(|source| ElevationError::Wait { source })?;
        status.code().map(Some).ok_or(ElevationError::Terminated)
    }
}

/// What the caller should do after passing the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Execute the verb in this process.
    Proceed,
    /// An elevated child executed the verb and exited with `code`.
    Forwarded {
        /// Raw child exit code.
        code: i32,
    },
    /// An elevated child was launched without waiting for it.
    Detached,
}

impl GateOutcome {
    /// Response the child reported, if it was awaited.
    #[must_use]
    pub fn response(self) -> Option<ServiceResponse> {
        match self {
            Self::Forwarded { code } => Some(ServiceResponse::from_exit_code(code)),
            Self::Proceed | Self::Detached => None,
        }
    }
}

/// Decides per verb whether to execute locally or re-invoke elevated.
#[derive(Clone)]
pub struct ElevationGate {
    elevator: Arc<dyn Elevator>,
}

impl Default for ElevationGate {
    fn default() -> Self {
        Self::new(Arc::new(SystemElevator))
    }
}

impl std::fmt::Debug for ElevationGate {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("ElevationGate").finish_non_exhaustive()
    }
}

impl ElevationGate {
    /// Builds a gate over `elevator`.
    #[must_use]
    pub fn new(elevator: Arc<dyn Elevator>) -> Self {
        Self { elevator }
    }

    /// Passes `verb` through the gate.
    ///
    /// `requires_elevation` is the service definition's switch; when it is
    /// off every verb proceeds locally. With `no_wait` the elevated child is
    /// detached instead of awaited.
    pub fn pass(
        &self,
        verb: ServiceVerb,
        requires_elevation: bool,
        command: &CommandLine,
        no_wait: bool,
    ) -> Result<GateOutcome, ElevationError> {
        if !requires_elevation || !needs_elevation(verb) || self.elevator.is_elevated() {
            return Ok(GateOutcome::Proceed);
        }
        info!(
            target: ELEVATION_TARGET,
            verb = %verb,
            wait = !no_wait,
            "re-invoking with administrator rights"
        );
        let Some(code) = self.elevator.relaunch(command, !no_wait)? else {
            return Ok(GateOutcome::Detached);
        };
        info!(
            target: ELEVATION_TARGET,
            verb = %verb,
            code,
            response = %ServiceResponse::from_exit_code(code),
            "elevated command finished"
        );
        Ok(GateOutcome::Forwarded { code })
    }
}
