//! systemd unit generation and `systemctl` primitives.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::definition::ServiceDefinition;
use crate::error::NativeError;
use crate::factory::HostKind;

use super::command::{CommandRunner, run_checked};
use super::{InitSystem, UNIX_TARGET, discard_artefact, systemd_command};

const SYSTEMCTL: &str = "systemctl";

/// Drives a service through `systemctl` and a unit under `unit_dir`.
#[derive(Clone)]
pub struct Systemd {
    unit_dir: PathBuf,
    commands: Arc<dyn CommandRunner>,
}

impl Systemd {
    /// Builds the adapter writing units into `unit_dir`.
    pub fn new(unit_dir: impl Into<PathBuf>, commands: Arc<dyn CommandRunner>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            commands,
        }
    }

    /// Path of the unit file for `definition`.
    #[must_use]
    pub fn unit_path(&self, definition: &ServiceDefinition) -> PathBuf {
        self.unit_dir.join(format!("{}.service", definition.name()))
    }

    /// Renders the unit file.
    ///
    /// The daemon runs in the foreground under systemd supervision and is
    /// restarted a minute after any exit.
    #[must_use]
    pub fn render_unit(definition: &ServiceDefinition) -> String {
        let description = definition
            .description()
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| definition.display_name().to_owned());
        let user = definition
            .user()
            .map(|user| format!("User={user}\n"))
            .unwrap_or_default();
        format!(
            "# {display_name} ({name})\n\
             [Unit]\n\
             Description={description}\n\
             After=network.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             ExecStart={command}\n\
             {user}\
             Restart=always\n\
             RestartSec=60\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            display_name = definition.display_name(),
            name = definition.name(),
            command = systemd_command(definition, &[]),
        )
    }

    fn systemctl(&self, arguments: &[&str]) -> Result<(), NativeError> {
        run_checked(self.commands.as_ref(), SYSTEMCTL, arguments)
    }

    fn systemctl_best_effort(&self, arguments: &[&str]) {
        if let Err(error) = self.systemctl(arguments) {
            warn!(
                target: UNIX_TARGET,
                error = %error,
                "systemctl cleanup step failed"
            );
        }
    }
}

impl std::fmt::Debug for Systemd {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Systemd")
            .field("unit_dir", &self.unit_dir)
            .finish_non_exhaustive()
    }
}

impl InitSystem for Systemd {
    fn kind(&self) -> HostKind {
        HostKind::Systemd
    }

    fn is_registered(&self, definition: &ServiceDefinition) -> bool {
        self.unit_path(definition).is_file()
    }

    fn install(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        let path = self.unit_path(definition);
        fs::write(&path, Self::render_unit(definition)).map_err(|source| {
            NativeError::Artefact {
                path: path.clone(),
                source,
            }
        })?;
        info!(target: UNIX_TARGET, unit = %path.display(), "systemd unit written");
        if let Err(error) = self.systemctl(&["daemon-reload"]) {
            discard_artefact(&path);
            return Err(error);
        }
        if let Err(error) = self.systemctl(&["enable", definition.name()]) {
            self.systemctl_best_effort(&["disable", definition.name()]);
            discard_artefact(&path);
            self.systemctl_best_effort(&["daemon-reload"]);
            return Err(error);
        }
        Ok(())
    }

    fn uninstall(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        if let Err(error) = self.systemctl(&["disable", definition.name()]) {
            warn!(
                target: UNIX_TARGET,
                service = definition.name(),
                error = %error,
                "systemd unit not disabled; removing it anyway"
            );
        }
        let path = self.unit_path(definition);
        match fs::remove_file(&path) {
            Err(source) if source.kind() != std::io::ErrorKind::NotFound => {
                return Err(NativeError::Artefact { path, source });
            }
            _ => {}
        }
        self.systemctl(&["daemon-reload"])
    }

    fn start(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        self.systemctl(&["start", definition.name()])
    }

    fn stop(&self, definition: &ServiceDefinition) -> Result<(), NativeError> {
        self.systemctl(&["stop", definition.name()])
    }
}
