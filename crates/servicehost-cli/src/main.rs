//! Entry point for `servicectl`, the service lifecycle controller.
//!
//! The binary delegates to [`servicehost_cli::run`], which loads
//! configuration, passes the verb through the elevation gate, and exits with
//! the verb's response code.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    servicehost_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
