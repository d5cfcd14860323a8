//! Shared configuration for the service host library and its control binary.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, an optional
//! configuration file, `SERVICEHOST_*` environment variables, and finally
//! command-line flags. Both the control commands and the daemon process load
//! the same [`Config`] so they agree on the service name, the status file
//! location, and the convergence timings.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoResult};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_FAILURE_RESET_SECS, DEFAULT_INIT_SCRIPT_DIR, DEFAULT_LOG_FILTER,
    DEFAULT_PENDING_GRACE_MS, DEFAULT_PENDING_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_RESTART_ATTEMPTS, DEFAULT_RESTART_DELAY_MS, DEFAULT_SERVICE_NAME, DEFAULT_STATUS_DIR,
    DEFAULT_STOP_RETRY_LIMIT, DEFAULT_SYSTEMD_UNIT_DIR, DEFAULT_WAIT_TIMEOUT_MS,
    default_init_script_dir, default_log_filter, default_log_filter_string, default_log_format,
    default_service_name, default_status_dir, default_systemd_unit_dir,
};
pub use logging::{LogDestination, LogFormat, LogFormatParseError};

/// Resolved configuration for one locally managed service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SERVICEHOST")]
pub struct Config {
    /// Logical service name; derives unit, script, and status file paths.
    #[ortho_config(default = default_service_name())]
    pub name: String,
    /// Human-readable name shown by the service manager.
    pub display_name: Option<String>,
    /// Free-form description; may span multiple lines.
    pub description: Option<String>,
    /// Account the systemd unit runs as.
    pub user: Option<String>,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// File receiving log lines instead of stderr.
    pub log_file: Option<Utf8PathBuf>,
    /// Directory holding the `{name}.service.pid` status file.
    #[ortho_config(default = default_status_dir())]
    pub status_dir: Utf8PathBuf,
    /// Directory receiving the generated systemd unit.
    #[ortho_config(default = default_systemd_unit_dir())]
    pub systemd_unit_dir: Utf8PathBuf,
    /// Directory receiving the generated SysV init script.
    #[ortho_config(default = default_init_script_dir())]
    pub init_script_dir: Utf8PathBuf,
    /// Status poll cadence in milliseconds.
    #[ortho_config(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    /// Ceiling for simple convergence waits in milliseconds.
    #[ortho_config(default = DEFAULT_WAIT_TIMEOUT_MS)]
    pub wait_timeout_ms: u64,
    /// Ceiling for pending-state waits in milliseconds.
    #[ortho_config(default = DEFAULT_PENDING_TIMEOUT_MS)]
    pub pending_timeout_ms: u64,
    /// Grace period before a pending-state wait bails out early.
    #[ortho_config(default = DEFAULT_PENDING_GRACE_MS)]
    pub pending_grace_ms: u64,
    /// Upper bound on stop attempts while the service oscillates.
    #[ortho_config(default = DEFAULT_STOP_RETRY_LIMIT)]
    pub stop_retry_limit: u32,
    /// Windows only: start the service with the delayed auto-start flag.
    #[ortho_config(default = false)]
    pub delayed_auto_start: bool,
    /// Windows only: number of scripted restarts after a crash.
    #[ortho_config(default = DEFAULT_RESTART_ATTEMPTS)]
    pub restart_attempts: u32,
    /// Windows only: delay before each scripted restart, in milliseconds.
    #[ortho_config(default = DEFAULT_RESTART_DELAY_MS)]
    pub restart_delay_ms: u64,
    /// Windows only: quiet period after which the failure count resets.
    #[ortho_config(default = DEFAULT_FAILURE_RESET_SECS)]
    pub failure_reset_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            display_name: None,
            description: None,
            user: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            log_file: None,
            status_dir: default_status_dir(),
            systemd_unit_dir: default_systemd_unit_dir(),
            init_script_dir: default_init_script_dir(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            pending_timeout_ms: DEFAULT_PENDING_TIMEOUT_MS,
            pending_grace_ms: DEFAULT_PENDING_GRACE_MS,
            stop_retry_limit: DEFAULT_STOP_RETRY_LIMIT,
            delayed_auto_start: false,
            restart_attempts: DEFAULT_RESTART_ATTEMPTS,
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
            failure_reset_secs: DEFAULT_FAILURE_RESET_SECS,
        }
    }
}

impl Config {
    /// Loads the layered configuration from the process arguments.
    ///
    /// # Errors
    ///
    /// Returns an [`ortho_config::OrthoError`] when any configuration layer
    /// fails to parse.
    pub fn load() -> OrthoResult<Self> {
        <Self as OrthoConfig>::load()
    }

    /// Loads the layered configuration from an explicit argument list.
    ///
    /// The first item is treated as the program name.
    ///
    /// # Errors
    ///
    /// Returns an [`ortho_config::OrthoError`] when any configuration layer
    /// fails to parse.
    pub fn load_from_iter<I, T>(iter: I) -> OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(iter)
    }

    /// Logical service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name, falling back to the logical name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Optional description text.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Account the systemd unit should run as.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Where log lines are written.
    #[must_use]
    pub fn log_destination(&self) -> LogDestination {
        self.log_file
            .clone()
            .map_or(LogDestination::Stderr, LogDestination::File)
    }

    /// Path of the PID+status marker file, `{status_dir}/{name}.service.pid`.
    #[must_use]
    pub fn status_path(&self) -> Utf8PathBuf {
        self.status_dir.join(format!("{}.service.pid", self.name))
    }

    /// Directory receiving the systemd unit file.
    #[must_use]
    pub fn systemd_unit_dir(&self) -> &Utf8Path {
        &self.systemd_unit_dir
    }

    /// Directory receiving the SysV init script.
    #[must_use]
    pub fn init_script_dir(&self) -> &Utf8Path {
        &self.init_script_dir
    }

    /// Status poll cadence.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Ceiling for simple convergence waits.
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Ceiling for pending-state waits.
    #[must_use]
    pub const fn pending_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_timeout_ms)
    }

    /// Grace period applied before pending-state waits bail out early.
    #[must_use]
    pub const fn pending_grace(&self) -> Duration {
        Duration::from_millis(self.pending_grace_ms)
    }

    /// Upper bound on stop attempts while the service oscillates.
    #[must_use]
    pub const fn stop_retry_limit(&self) -> u32 {
        self.stop_retry_limit
    }

    /// Delay before each scripted restart after a crash.
    #[must_use]
    pub const fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Quiet period after which the SCM resets its failure count.
    #[must_use]
    pub const fn failure_reset(&self) -> Duration {
        Duration::from_secs(self.failure_reset_secs)
    }
}
