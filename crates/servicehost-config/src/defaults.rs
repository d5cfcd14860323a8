use camino::Utf8PathBuf;

/// Service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "servicehost";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Directory holding status files on Unix hosts.
pub const DEFAULT_STATUS_DIR: &str = "/var/run";

/// Directory holding administrator-provided systemd units.
pub const DEFAULT_SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";

/// Directory holding SysV init scripts.
pub const DEFAULT_INIT_SCRIPT_DIR: &str = "/etc/init.d";

/// Status poll cadence.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Ceiling for simple convergence waits.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 60_000;

/// Ceiling for pending-state waits.
pub const DEFAULT_PENDING_TIMEOUT_MS: u64 = 180_000;

/// Grace period before a pending-state wait bails out.
pub const DEFAULT_PENDING_GRACE_MS: u64 = 3_000;

/// Attempts made by `Stop` before giving up on an oscillating service.
pub const DEFAULT_STOP_RETRY_LIMIT: u32 = 10;

/// Scripted SCM restarts after a crash.
pub const DEFAULT_RESTART_ATTEMPTS: u32 = 3;

/// Delay before each scripted SCM restart.
pub const DEFAULT_RESTART_DELAY_MS: u64 = 60_000;

/// Quiet period after which the SCM failure count resets (one day).
pub const DEFAULT_FAILURE_RESET_SECS: u64 = 86_400;

/// Default service name as an owned value.
pub fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_owned()
}

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default status file directory.
pub fn default_status_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_STATUS_DIR)
}

/// Default systemd unit directory.
pub fn default_systemd_unit_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SYSTEMD_UNIT_DIR)
}

/// Default SysV init script directory.
pub fn default_init_script_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_INIT_SCRIPT_DIR)
}
