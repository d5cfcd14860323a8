//! Runtime for `servicectl`, the control binary of the service host.
//!
//! The runtime splits leading configuration flags from the verb, loads the
//! layered configuration, builds the service definition for this executable,
//! and selects the service manager backend. Mutating verbs pass the
//! elevation gate first; a child re-invoked with administrator rights reports
//! back through its exit code, which is forwarded unchanged.
//!
//! Every lifecycle verb prints one result line on stdout and exits with the
//! response's code. `status` prints the status and exits with 0; `run` hands
//! the process over to the daemon loop.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use servicehost::{
    CommandLine, ElevationGate, GateOutcome, LaunchMode, ServiceDefinition, ServiceHost,
    ServiceHostFactory, ServiceResponse, ServiceVerb, telemetry,
};
use servicehost_config::Config;
use tracing::{error, info};

mod cli;
mod config;
mod daemon;
mod errors;

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use daemon::idle_application;
use errors::AppError;

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// Builds the service host for a resolved configuration.
pub(crate) type HostBuilder<'a> =
    dyn Fn(&Config, ServiceDefinition) -> Result<Box<dyn ServiceHost>, AppError> + 'a;

fn system_host(
    config: &Config,
    definition: ServiceDefinition,
) -> Result<Box<dyn ServiceHost>, AppError> {
    Ok(ServiceHostFactory::new(config.clone()).create(definition)?)
}

/// Collaborators used by a single invocation.
pub(crate) struct Runtime<'a, L: ConfigLoader> {
    loader: &'a L,
    hosts: &'a HostBuilder<'a>,
    gate: ElevationGate,
    command_line: Box<dyn Fn() -> std::io::Result<CommandLine> + 'a>,
}

impl<'a, L: ConfigLoader> Runtime<'a, L> {
    pub(crate) fn new(loader: &'a L, hosts: &'a HostBuilder<'a>, gate: ElevationGate) -> Self {
        Self {
            loader,
            hosts,
            gate,
            command_line: Box::new(CommandLine::current),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_command_line(mut self, command_line: CommandLine) -> Self {
        self.command_line = Box::new(move || Ok(command_line.clone()));
        self
    }

    pub(crate) fn run<W, E>(&self, args: Vec<OsString>, stdout: &mut W, stderr: &mut E) -> ExitCode
    where
        W: Write,
        E: Write,
    {
        match self.execute(&args, stdout) {
            Ok(exit_code) => exit_code,
            Err(AppError::CliUsage(usage)) if !usage.use_stderr() => {
                let _ = write!(stdout, "{usage}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                let _ = writeln!(stderr, "{error}");
                ExitCode::from(ServiceResponse::Failed.exit_code())
            }
        }
    }

    fn execute<W: Write>(&self, args: &[OsString], stdout: &mut W) -> Result<ExitCode, AppError> {
        let split = split_config_arguments(args);
        let cli = Cli::try_parse_from(split.command_arguments(args)).map_err(AppError::CliUsage)?;
        let config = self.loader.load(&split.config_arguments)?;
        telemetry::initialise(&config)?;

        let definition =
            ServiceDefinition::from_config(&config, split.flags()).map_err(AppError::Definition)?;
        let verb = ServiceVerb::from(cli.command);
        info!(
            target: CLI_TARGET,
            service = definition.name(),
            verb = %verb,
            "command received"
        );

        match cli.command {
            CliCommand::Status => {
                let host = (self.hosts)(&config, definition)?;
                print_line(stdout, &host.status().to_string())?;
                Ok(ExitCode::SUCCESS)
            }
            CliCommand::Run { detach } => {
                let host = (self.hosts)(&config, definition)?;
                let mode = if detach {
                    LaunchMode::Background
                } else {
                    LaunchMode::Foreground
                };
                let code = host.run(mode, Box::new(idle_application));
                Ok(exit_code_from_status(code))
            }
            _ => self.control(verb, &config, definition, cli.no_wait, stdout),
        }
    }

    fn control<W: Write>(
        &self,
        verb: ServiceVerb,
        config: &Config,
        definition: ServiceDefinition,
        no_wait: bool,
        stdout: &mut W,
    ) -> Result<ExitCode, AppError> {
        let command_line = (self.command_line)().map_err(AppError::CommandLine)?;
        let outcome = match self.gate.pass(
            verb,
            definition.requires_elevation(),
            &command_line,
            no_wait,
        ) {
            Ok(outcome) => outcome,
            Err(failure) => {
                error!(target: CLI_TARGET, verb = %verb, error = %failure, "elevation failed");
                return report(stdout, verb, ServiceResponse::ElevationFailed);
            }
        };

        match outcome {
            GateOutcome::Proceed => {
                let host = (self.hosts)(config, definition)?;
                let response = host.execute(verb).unwrap_or(ServiceResponse::Failed);
                report(stdout, verb, response)
            }
            GateOutcome::Forwarded { code } => {
                // The elevated child shares our stdout and already printed its line.
                info!(
                    target: CLI_TARGET,
                    verb = %verb,
                    code,
                    response = %ServiceResponse::from_exit_code(code),
                    "elevated child finished"
                );
                Ok(exit_code_from_status(code))
            }
            GateOutcome::Detached => {
                print_line(stdout, &format!("{verb}: launched with administrator rights"))?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn report<W: Write>(
    stdout: &mut W,
    verb: ServiceVerb,
    response: ServiceResponse,
) -> Result<ExitCode, AppError> {
    print_line(stdout, &format!("{verb}: {response}"))?;
    Ok(ExitCode::from(response.exit_code()))
}

fn print_line<W: Write>(stdout: &mut W, line: &str) -> Result<(), AppError> {
    writeln!(stdout, "{line}").map_err(AppError::Output)?;
    stdout.flush().map_err(AppError::Output)
}

fn exit_code_from_status(status: i32) -> ExitCode {
    u8::try_from(status.rem_euclid(256)).map_or(ExitCode::FAILURE, ExitCode::from)
}

/// Runs `servicectl` with the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let runtime = Runtime::new(&OrthoConfigLoader, &system_host, ElevationGate::default());
    runtime.run(args.into_iter().collect(), stdout, stderr)
}
