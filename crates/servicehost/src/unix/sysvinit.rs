//! SysV init-script generation and `update-rc.d`/`service` primitives.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::definition::ServiceDefinition;
use crate::error::NativeError;
use crate::factory::HostKind;

use super::command::{CommandRunner, run_checked};
use super::{InitSystem, UNIX_TARGET, discard_artefact, shell_command};

const UPDATE_RC: &str = "update-rc.d";
const SERVICE: &str = "service";
const SCRIPT_MODE: u32 = 0o755;

/// Drives a service through an init script under `script_dir`.
///
/// The script launches the daemon with `run --detach` and stops it by
/// sending `SIGTERM` to the pid published in the status file.
#[derive(Clone)]
pub struct SysVInit {
    script_dir: PathBuf,
    status_path: PathBuf,
    commands: Arc<dyn CommandRunner>,
}

impl SysVInit {
    /// Builds the adapter writing scripts into `script_dir`.
    pub fn new(
        script_dir: impl Into<PathBuf>,
        status_path: impl Into<PathBuf>,
        commands: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            script_dir: script_dir.into(),
            status_path: status_path.into(),
            commands,
        }
    }

    /// Path of the init script for `definition`.
    #[must_use]
    pub fn script_path(&self, definition: &ServiceDefinition) -> PathBuf {
        self.script_dir.join(definition.name())
    }

    /// Renders the init script.
    #[must_use]
    pub fn render_script(&self, definition: &ServiceDefinition) -> String {
        let mut description = String::new();
        if let Some(text) = definition.description() {
            for (index, line) in text.lines().enumerate() {
                let lead = if index == 0 {
                    "# Description:       "
                } else {
                    "#                    "
                };
                description.push_str(lead);
                description.push_str(line.trim());
                description.push('\n');
            }
        }
        format!(
            r#"#!/bin/sh
### BEGIN INIT INFO
# Provides:          {name}
# Required-Start:    $remote_fs $syslog
# Required-Stop:     $remote_fs $syslog
# Default-Start:     2 3 4 5
# Default-Stop:      0 1 6
# Short-Description: {display_name}
{description}### END INIT INFO

NAME='{name}'
STATUS_FILE='{status_file}'

daemon_pid() {{
    [ -r "$STATUS_FILE" ] || return 1
    read -r STATE PID < "$STATUS_FILE" || return 1
    [ "$STATE" != "Stopped" ] || return 1
    [ "$PID" -gt 0 ] 2>/dev/null || return 1
    kill -0 "$PID" 2>/dev/null || return 1
    echo "$PID"
}}

case "$1" in
    start)
        if daemon_pid >/dev/null; then
            echo "$NAME is already running"
            exit 0
        fi
        {command}
        ;;
    stop)
        if ! PID=$(daemon_pid); then
            echo "$NAME is not running"
            exit 0
        fi
        kill -TERM "$PID"
        ;;
    restart)
        "$0" stop
        while daemon_pid >/dev/null; do
            sleep 1
        done
        "$0" start
        ;;
    status)
        if PID=$(daemon_pid); then
            echo "$NAME is running ($PID)"
        else
            echo "$NAME is stopped"
            exit 3
        fi
        ;;
    *)
        echo "Usage: $0 {{start|stop|restart|status}}" >&2
        exit 2
        ;;
esac
exit 0
"#,
            name = definition.name(),
            display_name = definition.display_name(),
            status_file = self.status_path.display(),
            command = shell_command(definition, &["--detach"]),
        )
    }
}

impl std::fmt::Debug for SysVInit {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SysVInit")
            .field("script_dir", &self.script_dir)
            .field("status_path", &self.status_path)
            .finish_non_exhaustive()
    }
}

impl InitSystem for SysVInit {
    fn kind(&self) -> HostKind {
        HostKind::SysVInit
    }

    fn is_registered(&self, definition: &ServiceDefinition) -> bool {
        self.script_path(definition).is_file()
    }

    fn install(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        let path = self.script_path(definition);
        let artefact = |source: std::io::Error| NativeError::Artefact {
            path: path.clone(),
            source,
        };
        fs::write(&path, self.render_script(definition)).map_err(artefact)?;
        if let Err(error) = fs::set_permissions(&path, fs::Permissions::from_mode(SCRIPT_MODE)) {
            discard_artefact(&path);
            return Err(artefact(error));
        }
        info!(target: UNIX_TARGET, script = %path.display(), "init script written");
        let registered = run_checked(
            self.commands.as_ref(),
            UPDATE_RC,
            &["-f", definition.name(), "defaults"],
        );
        if registered.is_err() {
            if let Err(error) = run_checked(
                self.commands.as_ref(),
                UPDATE_RC,
                &["-f", definition.name(), "remove"],
            ) {
                warn!(
                    target: UNIX_TARGET,
                    service = definition.name(),
                    error = %error,
                    "runlevel links not removed"
                );
            }
            discard_artefact(&path);
        }
        registered
    }

    fn uninstall(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        run_checked(
            self.commands.as_ref(),
            UPDATE_RC,
            &["-f", definition.name(), "remove"],
        )?;
        let path = self.script_path(definition);
        match fs::remove_file(&path) {
            Err(source) if source.kind() != std::io::ErrorKind::NotFound => {
                Err(NativeError::Artefact { path, source })
            }
            _ => Ok(()),
        }
    }

    fn start(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        run_checked(self.commands.as_ref(), SERVICE, &[definition.name(), "start"])
    }

    fn stop(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        run_checked(self.commands.as_ref(), SERVICE, &[definition.name(), "stop"])
    }
}
