//! Errors surfaced while running as the daemon.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

#[cfg(unix)]
use super::daemonizer::DaemonizeError;

/// Failure reported by the hosted application's start callback.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HostedError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HostedError {
    /// Builds an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors that end the daemon run with a non-zero exit code.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Installing the signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The hosted application could not be started.
    #[error("hosted application failed to start: {source}")]
    Hosted {
        /// Error returned by the start callback.
        #[source]
        source: HostedError,
    },
    /// Detaching into the background failed.
    #[cfg(unix)]
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Registering with the Service Control Manager failed.
    #[error("service control manager registration failed: {message}")]
    ServiceManager {
        /// OS error description.
        message: String,
    },
}

impl From<HostedError> for DaemonError {
    fn from(source: HostedError) -> Self {
        Self::Hosted { source }
    }
}

#[cfg(unix)]
impl From<DaemonizeError> for DaemonError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl DaemonError {
    /// Process exit code reported for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Signals { .. } => 2,
            Self::Hosted { .. } => 3,
            #[cfg(unix)]
            Self::Daemonize { .. } => 4,
            Self::ServiceManager { .. } => 5,
        }
    }
}
