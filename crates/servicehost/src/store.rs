//! Durable PID+status marker shared between control commands and the daemon.
//!
//! The record is a single ASCII line, `"{ServiceStatus} {pid}"`. Writers always
//! replace the whole file. Readers heal stale records: any status other than
//! `Stopped` whose pid no longer names a live process reads back as
//! `Stopped` with pid 0, which is how a crashed daemon is detected.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::Builder;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::process::ProcessTable;
use crate::status::ServiceStatus;

const STORE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::store");
const MAX_ATTEMPTS: u32 = 10;
const BACKOFF_STEP: Duration = Duration::from_millis(5);

/// One decoded status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRecord {
    /// Recorded lifecycle state.
    pub status: ServiceStatus,
    /// Pid of the writer; 0 when unknown or healed.
    pub pid: u32,
}

impl StatusRecord {
    /// Builds a record.
    #[must_use]
    pub const fn new(status: ServiceStatus, pid: u32) -> Self {
        Self { status, pid }
    }

    /// The record substituted for unreadable or malformed content.
    #[must_use]
    pub const fn unknown() -> Self {
        Self::new(ServiceStatus::Unknown, 0)
    }

    /// Parses `"{status} {pid}"`; anything else decodes as [`Self::unknown`].
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut fields = content.split_whitespace();
        let (Some(status), Some(pid), None) = (fields.next(), fields.next(), fields.next()) else {
            return Self::unknown();
        };
        match (status.parse::<ServiceStatus>(), pid.parse::<u32>()) {
            (Ok(status), Ok(pid)) => Self::new(status, pid),
            _ => Self::unknown(),
        }
    }

    /// Renders the on-disk line, including the trailing newline.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{} {}\n", self.status, self.pid)
    }
}

/// Raw storage behind the status record.
pub trait StatusFile: Send + Sync {
    /// Reads the whole record; `Ok(None)` when the file is absent.
    fn load(&self) -> io::Result<Option<String>>;

    /// Replaces the whole record.
    fn save(&self, content: &str) -> io::Result<()>;

    /// Deletes the record; absent files are not an error.
    fn remove(&self) -> io::Result<()>;

    /// Human-readable location for diagnostics.
    fn location(&self) -> String;
}

/// Status record stored on the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskStatusFile {
    path: PathBuf,
}

impl DiskStatusFile {
    /// Builds a status file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the status file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusFile for DiskStatusFile {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Writes a sibling temp file and renames it over the record, so a
    /// concurrent reader sees either the old line or the new one.
    fn save(&self, content: &str) -> io::Result<()> {
        let directory = self.path.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "status file path has no parent directory",
            )
        })?;

        let mut builder = Builder::new();
        builder.prefix(
            self.path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("servicehost"),
        );
        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(Permissions::from_mode(0o644));
        }

        let mut file = builder.tempfile_in(directory)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
            _ => Ok(()),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory status record for tests and embedders that simulate a host.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusFile {
    content: Arc<Mutex<Option<String>>>,
    pending_failures: Arc<Mutex<u32>>,
}

impl MemoryStatusFile {
    /// Builds an empty (absent) record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the raw content, bypassing the store.
    pub fn set_raw(&self, content: Option<&str>) {
        *lock(&self.content) = content.map(str::to_owned);
    }

    /// Returns the raw content.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        lock(&self.content).clone()
    }

    /// Makes the next `count` operations fail as if the file were locked.
    pub fn fail_next(&self, count: u32) {
        *lock(&self.pending_failures) = count;
    }

    fn take_failure(&self) -> io::Result<()> {
        let mut pending = lock(&self.pending_failures);
        if *pending == 0 {
            return Ok(());
        }
        *pending -= 1;
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "status file is locked",
        ))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl StatusFile for MemoryStatusFile {
    fn load(&self) -> io::Result<Option<String>> {
        self.take_failure()?;
        Ok(lock(&self.content).clone())
    }

    fn save(&self, content: &str) -> io::Result<()> {
        self.take_failure()?;
        *lock(&self.content) = Some(content.to_owned());
        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        self.take_failure()?;
        *lock(&self.content) = None;
        Ok(())
    }

    fn location(&self) -> String {
        String::from("<memory>")
    }
}

/// Status-file operation that failed after every retry.
#[derive(Debug, Error)]
#[error("status file {operation} failed at '{location}' after {attempts} attempts: {source}")]
pub struct StoreError {
    /// Operation that failed (`read`, `write`, `remove`).
    pub operation: &'static str,
    /// Location reported by the backing file.
    pub location: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Last I/O error observed.
    #[source]
    pub source: io::Error,
}

/// Self-healing reader and retrying writer for the status record.
pub struct StatusStore {
    file: Box<dyn StatusFile>,
    processes: Arc<dyn ProcessTable>,
    clock: Arc<dyn Clock>,
    pid: Option<u32>,
}

impl StatusStore {
    /// Builds a store recording the writer's process id.
    ///
    /// The pid is resolved at write time so a store built before the daemon
    /// detaches still records the detached child.
    pub fn new(file: impl StatusFile + 'static, processes: Arc<dyn ProcessTable>) -> Self {
        Self {
            file: Box::new(file),
            processes,
            clock: Arc::new(SystemClock),
            pid: None,
        }
    }

    /// Replaces the clock used for retry backoff.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the pid recorded by [`Self::write_status`].
    #[must_use]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Pid this store records on write.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid.unwrap_or_else(std::process::id)
    }

    /// Process table used for liveness probes.
    #[must_use]
    pub fn processes(&self) -> &Arc<dyn ProcessTable> {
        &self.processes
    }

    /// Persists `"{status} {pid}"`, retrying transient failures.
    pub fn write_status(&self, status: ServiceStatus) -> Result<(), StoreError> {
        let record = StatusRecord::new(status, self.pid());
        let line = record.render();
        self.retry("write", || self.file.save(&line))?;
        debug!(
            target: STORE_TARGET,
            status = %status,
            pid = record.pid,
            file = %self.file.location(),
            "status recorded"
        );
        Ok(())
    }

    /// Best-effort variant of [`Self::write_status`] that only logs failures.
    pub fn record(&self, status: ServiceStatus) {
        if let Err(error) = self.write_status(status) {
            warn!(
                target: STORE_TARGET,
                status = %status,
                error = %error,
                "status not recorded; continuing"
            );
        }
    }

    /// Reads and heals the record; `None` when no record exists.
    ///
    /// Unreadable or malformed content yields an `Unknown` record. A record
    /// other than `Stopped` whose pid is dead yields `Stopped` with pid 0.
    pub fn read_status(&self) -> Option<StatusRecord> {
        let content = match self.retry("read", || self.file.load()) {
            Ok(content) => content?,
            Err(error) => {
                warn!(
                    target: STORE_TARGET,
                    error = %error,
                    "status unreadable; reporting unknown"
                );
                return Some(StatusRecord::unknown());
            }
        };
        let record = StatusRecord::parse(&content);
        Some(self.heal(record))
    }

    /// Deletes the record.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.retry("remove", || self.file.remove())
    }

    fn heal(&self, record: StatusRecord) -> StatusRecord {
        if record.status == ServiceStatus::Stopped
            || record.status == ServiceStatus::Unknown && record.pid == 0
        {
            return record;
        }
        if self.processes.is_alive(record.pid) {
            return record;
        }
        debug!(
            target: STORE_TARGET,
            status = %record.status,
            pid = record.pid,
            "recorded process is gone; treating as stopped"
        );
        StatusRecord::new(ServiceStatus::Stopped, 0)
    }

    fn retry<T>(
        &self,
        operation: &'static str,
        mut attempt_once: impl FnMut() -> io::Result<T>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0;
        loop {
            match attempt_once() {
                Ok(value) => return Ok(value),
                Err(source) if attempt + 1 >= MAX_ATTEMPTS => {
                    return Err(StoreError {
                        operation,
                        location: self.file.location(),
                        attempts: MAX_ATTEMPTS,
                        source,
                    });
                }
                Err(_) => {
                    attempt += 1;
                    self.clock.sleep(BACKOFF_STEP * attempt);
                }
            }
        }
    }
}

impl std::fmt::Debug for StatusStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StatusStore")
            .field("file", &self.file.location())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}
