//! Structured logging for control commands and the daemon.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::{Subscriber, info, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};

use servicehost_config::{Config, LogDestination, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression does not parse.
    #[error("invalid log filter '{filter}' for service '{service}': {message}")]
    Filter {
        /// Service being logged for.
        service: String,
        /// Offending expression.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// The configured log file cannot be opened for appending.
    #[error("cannot open log file '{path}' for service '{service}': {source}")]
    LogFile {
        /// Service being logged for.
        service: String,
        /// Configured path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Another subscriber was installed before ours.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use; later calls are no-ops.
///
/// Logs go to stderr unless a log file is configured, so the single result
/// line a control command prints on stdout stays machine-readable.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
        service: config.name().to_owned(),
        filter: config.log_filter().to_owned(),
        message: error.to_string(),
    })?;
    let destination = config.log_destination();
    let (writer, ansi) = open_writer(config.name(), &destination)?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    info!(
        target: TELEMETRY_TARGET,
        service = config.name(),
        format = %config.log_format(),
        destination = %destination,
        "logging initialised"
    );
    Ok(())
}

/// Opens the sink for `destination`; colour only when it is a terminal.
fn open_writer(
    service: &str,
    destination: &LogDestination,
) -> Result<(BoxMakeWriter, bool), TelemetryError> {
    match destination {
        LogDestination::Stderr => Ok((BoxMakeWriter::new(io::stderr), io::stderr().is_terminal())),
        LogDestination::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.as_std_path())
                .map_err(|source| TelemetryError::LogFile {
                    service: service.to_owned(),
                    path: path.to_string(),
                    source,
                })?;
            Ok((BoxMakeWriter::new(Mutex::new(file)), false))
        }
    }
}
