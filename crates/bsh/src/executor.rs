// SPDX-License-Identifier: MIT OR Apache-2.0
//! The seam between handles and process execution.

use async_trait::async_trait;
use bsh_config::Options;
use bsh_runner::{ExecResult, Runner, ShellProgram};

/// Executes one resolved command.
///
/// Implementations report every outcome through the returned
/// [`ExecResult`]; the pass/fail policy is applied by the caller.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run `command` with fully merged `options`.
    async fn execute(&self, command: String, options: Options) -> ExecResult;
}

/// Executor that spawns real processes through a shell.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    runner: Runner,
}

impl ProcessExecutor {
    /// Executor using `/bin/sh`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor using the given shell program.
    pub fn with_shell(shell: ShellProgram) -> Self {
        Self {
            runner: Runner::with_shell(shell),
        }
    }

    /// The shell program in use.
    pub fn shell(&self) -> &ShellProgram {
        self.runner.shell()
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    fn name(&self) -> &str {
        "process"
    }

    async fn execute(&self, command: String, options: Options) -> ExecResult {
        self.runner.execute(&command, &options).await
    }
}
