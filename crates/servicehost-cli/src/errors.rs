//! Error types for the control binary.

use std::io;
use std::sync::Arc;

use servicehost::{FactoryError, NativeError, TelemetryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to describe the service: {0}")]
    Definition(#[source] NativeError),
    #[error("no usable service manager: {0}")]
    Factory(#[from] FactoryError),
    #[error("failed to resolve the current command line: {0}")]
    CommandLine(#[source] io::Error),
    #[error("failed to write the result: {0}")]
    Output(#[source] io::Error),
}
