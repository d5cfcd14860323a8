//! Runs init-system tools such as `systemctl` and `update-rc.d`.

use std::process::Command;

use tracing::{debug, warn};

use crate::error::NativeError;

use super::UNIX_TARGET;

/// Outcome of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful, silent exit.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
        }
    }

    /// Returns `true` when the command exited with status 0.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.code == Some(0)
    }
}

/// Abstraction over spawning init-system tools.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `arguments` to completion.
    fn run(&self, program: &str, arguments: &[String]) -> Result<CommandOutput, NativeError>;
}

impl<T> CommandRunner for std::sync::Arc<T>
where
    T: CommandRunner + ?Sized,
{
    fn run(&self, program: &str, arguments: &[String]) -> Result<CommandOutput, NativeError> {
        (**self).run(program, arguments)
    }
}

/// Runs commands through [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, arguments: &[String]) -> Result<CommandOutput, NativeError> {
        let output = Command::new(program)
            .args(arguments)
            .output()
            .map_err(|source| NativeError::Spawn {
                program: program.to_owned(),
                source,
            })?;
        Ok(CommandOutput {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs a command and fails unless it exits with status 0.
pub(crate) fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    arguments: &[&str],
) -> Result<(), NativeError> {
    let owned: Vec<String> = arguments.iter().map(|argument| (*argument).to_owned()).collect();
    let command = render(program, &owned);
    debug!(target: UNIX_TARGET, command = %command, "running init-system command");
    let output = runner.run(program, &owned)?;
    if output.succeeded() {
        return Ok(());
    }
    warn!(
        target: UNIX_TARGET,
        command = %command,
        code = ?output.code,
        stderr = %output.stderr.trim(),
        "init-system command failed"
    );
    Err(NativeError::ExitStatus {
        command,
        code: output.code,
    })
}

fn render(program: &str, arguments: &[String]) -> String {
    std::iter::once(program)
        .chain(arguments.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
