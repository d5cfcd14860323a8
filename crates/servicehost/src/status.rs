//! Lifecycle states, verb results, and the verb vocabulary shared by every
//! backend.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Observed lifecycle state of the managed service.
///
/// The textual form (`Running`, `StopPending`, ...) is what the Unix status
/// file stores, so renaming a variant changes the on-disk format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum ServiceStatus {
    /// Indeterminate; produced by timeouts and unreadable status records.
    Unknown,
    /// No artefact is registered with the service manager.
    NotInstalled,
    /// Registered but not running.
    Stopped,
    /// A start was requested and has not yet converged.
    StartPending,
    /// A stop was requested and has not yet converged.
    StopPending,
    /// The service is running.
    Running,
    /// A resume was requested and has not yet converged.
    ContinuePending,
    /// A pause was requested and has not yet converged.
    PausePending,
    /// The service is running but its hosted work is suspended.
    Paused,
}

impl ServiceStatus {
    /// Returns `true` for the four states a service can rest in.
    #[must_use]
    pub const fn is_stable(self) -> bool {
        matches!(
            self,
            Self::NotInstalled | Self::Stopped | Self::Running | Self::Paused
        )
    }

    /// Returns `true` for transient states that must resolve on their own.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::StartPending | Self::StopPending | Self::ContinuePending | Self::PausePending
        )
    }

    /// Returns `true` when nothing further will happen without a new command.
    #[must_use]
    pub const fn is_terminal_for_wait(self) -> bool {
        matches!(self, Self::NotInstalled | Self::Unknown)
    }
}

/// Result of a lifecycle verb.
///
/// Codes greater than zero are successes or idempotent no-ops that scripted
/// callers may treat as success; codes at or below zero are failures. The
/// code doubles as the control binary's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum ServiceResponse {
    /// The requested mutation converged.
    Ok,
    /// Install found the service already registered.
    AlreadyInstalled,
    /// The service is not registered with the service manager.
    NotInstalled,
    /// Start or Continue found the service already running.
    AlreadyRunning,
    /// Start found a start or resume already in flight and waited for it.
    AlreadyStarting,
    /// Stop found a stop already in flight and waited for it.
    AlreadyStopping,
    /// Stop, Pause or Continue found the service not running.
    NotRunning,
    /// Pause found the service already paused.
    AlreadyPaused,
    /// Unclassified failure, including an unreadable status. Never encoded
    /// as zero so a failed command cannot exit successfully.
    Failed,
    /// Start did not converge on `Running`.
    StartFailed,
    /// Stop did not converge on `Stopped`.
    StopFailed,
    /// Pause did not converge on `Paused`.
    PauseFailed,
    /// Continue did not converge on `Running`.
    ContinueFailed,
    /// Registering the service artefact failed.
    InstallFailed,
    /// Removing the service artefact failed.
    UninstallFailed,
    /// Re-invoking the command with elevated rights failed.
    ElevationFailed,
}

impl ServiceResponse {
    /// Stable integer code for this response.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 1,
            Self::AlreadyInstalled => 2,
            Self::NotInstalled => 3,
            Self::AlreadyRunning => 4,
            Self::AlreadyStarting => 5,
            Self::AlreadyStopping => 6,
            Self::NotRunning => 7,
            Self::AlreadyPaused => 8,
            Self::StartFailed => -1,
            Self::StopFailed => -2,
            Self::PauseFailed => -3,
            Self::ContinueFailed => -4,
            Self::InstallFailed => -5,
            Self::UninstallFailed => -6,
            Self::ElevationFailed => -7,
            Self::Failed => -8,
        }
    }

    /// Returns `true` when callers should treat the response as success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.code() > 0
    }

    /// Decodes a response from its integer code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        use strum::IntoEnumIterator;

        Self::iter().find(|response| response.code() == code)
    }

    /// Decodes a child process exit status into a response.
    ///
    /// Unix truncates exit statuses to eight bits, so `255` decodes as `-1`.
    /// Unrecognised codes decode as [`ServiceResponse::Failed`].
    #[must_use]
    pub fn from_exit_code(code: i32) -> Self {
        if let Some(response) = Self::from_code(code) {
            return response;
        }
        let wrapped = if (128..=255).contains(&code) {
            code - 256
        } else {
            code
        };
        Self::from_code(wrapped).unwrap_or(Self::Failed)
    }

    /// Exit status for the control binary; negative codes wrap on Unix.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        u8::try_from(self.code().rem_euclid(256)).unwrap_or(u8::MAX)
    }
}

/// Lifecycle verbs understood by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ServiceVerb {
    /// Register the service artefact.
    Install,
    /// Stop and unregister the service.
    Uninstall,
    /// Uninstall, install, and restore the previous running state.
    Reinstall,
    /// Start the service.
    Start,
    /// Stop the service.
    Stop,
    /// Stop then start the service.
    Restart,
    /// Suspend the hosted work.
    Pause,
    /// Resume the hosted work.
    Continue,
    /// Report the current status.
    Status,
    /// Run as the daemon under service-manager supervision.
    Run,
}
