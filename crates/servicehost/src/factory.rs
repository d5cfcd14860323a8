//! Selects the service-manager backend for this host.

use std::path::PathBuf;
use std::sync::Arc;

use servicehost_config::Config;
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;
use tracing::info;

use crate::clock::SystemClock;
use crate::definition::ServiceDefinition;
use crate::lifecycle::{Lifecycle, ServiceHost};
use crate::poller::{Poller, WaitTimings};

const FACTORY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::factory");

/// Directory systemd creates at boot when it is the running init system.
pub const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

/// Service managers with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum HostKind {
    /// systemd units driven through `systemctl`.
    Systemd,
    /// SysV init scripts driven through `update-rc.d` and `service`.
    #[strum(serialize = "sysvinit")]
    SysVInit,
    /// The Windows Service Control Manager.
    Win32,
}

/// Errors raised while selecting a backend.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No supported service manager was detected.
    #[error(
        "no supported service manager found (looked for '{systemd_dir}' and '{init_script_dir}')"
    )]
    Unsupported {
        /// systemd runtime directory probed.
        systemd_dir: PathBuf,
        /// Init-script directory probed.
        init_script_dir: PathBuf,
    },
    /// The requested backend does not exist on this platform.
    #[error("the {kind} backend is not available on this platform")]
    UnavailableBackend {
        /// Requested backend.
        kind: HostKind,
    },
}

/// Paths consulted when probing a Unix host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProbe {
    systemd_dir: PathBuf,
    init_script_dir: PathBuf,
}

impl HostProbe {
    /// Builds a probe looking at the given directories.
    pub fn new(systemd_dir: impl Into<PathBuf>, init_script_dir: impl Into<PathBuf>) -> Self {
        Self {
            systemd_dir: systemd_dir.into(),
            init_script_dir: init_script_dir.into(),
        }
    }

    /// Probe for the live host using `config`'s init-script directory.
    #[must_use]
    pub fn for_config(config: &Config) -> Self {
        Self::new(SYSTEMD_RUNTIME_DIR, config.init_script_dir().as_std_path())
    }

    /// Detects the active service manager.
    ///
    /// Windows always uses the SCM. On Unix a running systemd wins over a
    /// present init-script directory.
    pub fn detect(&self) -> Result<HostKind, FactoryError> {
        if cfg!(windows) {
            return Ok(HostKind::Win32);
        }
        if self.systemd_dir.is_dir() {
            return Ok(HostKind::Systemd);
        }
        if self.init_script_dir.is_dir() {
            return Ok(HostKind::SysVInit);
        }
        Err(FactoryError::Unsupported {
            systemd_dir: self.systemd_dir.clone(),
            init_script_dir: self.init_script_dir.clone(),
        })
    }
}

/// Builds the [`ServiceHost`] for the active service manager.
#[derive(Debug, Clone)]
pub struct ServiceHostFactory {
    config: Config,
    probe: HostProbe,
}

impl ServiceHostFactory {
    /// Builds a factory probing the live host.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let probe = HostProbe::for_config(&config);
        Self { config, probe }
    }

    /// Replaces the host probe.
    #[must_use]
    pub fn with_probe(mut self, probe: HostProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Detects the service manager and builds its host for `definition`.
    pub fn create(
        &self,
        definition: ServiceDefinition,
    ) -> Result<Box<dyn ServiceHost>, FactoryError> {
        let kind = self.probe.detect()?;
        info!(
            target: FACTORY_TARGET,
            service = definition.name(),
            host = %kind,
            "service manager detected"
        );
        self.create_for(kind, definition)
    }

    /// Builds the host for an explicit service manager.
    pub fn create_for(
        &self,
        kind: HostKind,
        definition: ServiceDefinition,
    ) -> Result<Box<dyn ServiceHost>, FactoryError> {
        let poller = Poller::new(Arc::new(SystemClock), WaitTimings::from(&self.config));
        let retry_limit = self.config.stop_retry_limit();
        match kind {
            #[cfg(unix)]
            HostKind::Systemd => {
                let init = crate::unix::Systemd::new(
                    self.config.systemd_unit_dir().as_std_path(),
                    Arc::new(crate::unix::SystemCommandRunner),
                );
                Ok(Box::new(Lifecycle::new(
                    crate::unix::UnixBackend::new(definition, init, self.status_store()),
                    poller,
                    retry_limit,
                )))
            }
            #[cfg(unix)]
            HostKind::SysVInit => {
                let init = crate::unix::SysVInit::new(
                    self.config.init_script_dir().as_std_path(),
                    self.config.status_path().into_std_path_buf(),
                    Arc::new(crate::unix::SystemCommandRunner),
                );
                Ok(Box::new(Lifecycle::new(
                    crate::unix::UnixBackend::new(definition, init, self.status_store()),
                    poller,
                    retry_limit,
                )))
            }
            #[cfg(windows)]
            HostKind::Win32 => Ok(Box::new(Lifecycle::new(
                crate::windows::Win32Backend::new(
                    definition,
                    crate::windows::InstallOptions::from(&self.config),
                ),
                poller,
                retry_limit,
            ))),
            other => Err(FactoryError::UnavailableBackend { kind: other }),
        }
    }

    #[cfg(unix)]
    fn status_store(&self) -> crate::store::StatusStore {
        crate::store::StatusStore::new(
            crate::store::DiskStatusFile::new(self.config.status_path().into_std_path_buf()),
            Arc::new(crate::process::SystemProcessTable),
        )
    }
}
