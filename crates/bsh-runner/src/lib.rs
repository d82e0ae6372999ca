// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shell command execution for bshell.
//!
//! [`run`] spawns one command through `/bin/sh -c`, tees its stdout and
//! stderr into capture buffers and (unless suppressed) onto the host's own
//! streams, enforces an optional timeout with SIGTERM, and classifies the
//! outcome into an [`ExecResult`]. The pass/fail policy in [`check`] turns
//! failed results into a [`CommandError`] unless `mayfail` is set.
//!
//! For finer control, [`start`] returns a [`RunningCommand`] whose pid is
//! known before the command finishes.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod identity;
mod process;
mod result;
mod signal;

pub use error::{CommandError, check};
pub use identity::{gid_of, uid_of};
pub use process::{DEFAULT_SHELL, RunningCommand, ShellProgram, SpawnSpec, start};
pub use result::{ExecResult, SpawnError};
pub use signal::{Signal, send_signal, signal_name};

use bsh_config::Options;

/// Runs commands with a fixed shell program.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    shell: ShellProgram,
}

impl Runner {
    /// A runner using `/bin/sh`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner using the given shell program.
    pub fn with_shell(shell: ShellProgram) -> Self {
        Self { shell }
    }

    /// The shell program in use.
    pub fn shell(&self) -> &ShellProgram {
        &self.shell
    }

    /// Run `command` to completion without applying the pass/fail policy.
    ///
    /// Identity lookup failures are reported as a spawn error in the result.
    pub async fn execute(&self, command: &str, options: &Options) -> ExecResult {
        match SpawnSpec::from_options(options, self.shell.clone()) {
            Ok(spec) => start(command, &spec).await.wait().await,
            Err(err) => ExecResult {
                error: Some(err),
                ..Default::default()
            },
        }
    }

    /// Run `command` and apply [`check`] with the options' `mayfail`.
    pub async fn run(&self, command: &str, options: &Options) -> Result<ExecResult, CommandError> {
        let result = self.execute(command, options).await;
        check(result, command, options.is_mayfail())
    }
}

/// Run `command` through `/bin/sh` with `options`.
pub async fn run(command: &str, options: &Options) -> Result<ExecResult, CommandError> {
    Runner::new().run(command, options).await
}
