// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command handles bound to an execution lane and an option set.

use crate::executor::{Executor, ProcessExecutor};
use bsh_config::{Options, ShellConfig};
use bsh_queue::{Pending, Queue};
use bsh_runner::{CommandError, ExecResult, ShellProgram, check};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A handle for running shell commands.
///
/// Every handle owns an effective [`Options`] set and shares an execution
/// lane with the handle it was derived from. Commands run on a handle's lane
/// one at a time, in the order they were submitted.
///
/// - [`Shell::with`] and the option shorthands (`cd`, `env`, `quiet`, ...)
///   derive a handle with merged options on the **same** lane.
/// - [`Shell::fork`] derives a handle with the same options on a **new**
///   lane, which is not ordered relative to its parent.
///
/// When a command fails, every command already queued behind it on the same
/// lane is skipped and fails with the same error. Commands submitted after
/// the failure has been observed start a fresh chain.
#[derive(Clone)]
pub struct Shell {
    options: Arc<Options>,
    queue: Queue<CommandError>,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell")
            .field("options", &self.options)
            .field("executor", &self.executor.name())
            .field("queue", &self.queue)
            .finish()
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    /// A root handle with default options running commands via `/bin/sh`.
    pub fn new() -> Self {
        Self::with_executor(Arc::new(ProcessExecutor::new()), Options::default())
    }

    /// A root handle using the shell program and default options of `config`.
    pub fn from_config(config: &ShellConfig) -> Self {
        let shell = ShellProgram::from_config(config.shell.as_deref());
        Self::with_executor(
            Arc::new(ProcessExecutor::with_shell(shell)),
            config.defaults.clone(),
        )
    }

    /// A root handle with a custom executor and global options.
    pub fn with_executor(executor: Arc<dyn Executor>, options: Options) -> Self {
        Self {
            options: Arc::new(options),
            queue: Queue::new(),
            executor,
        }
    }

    /// The effective options of this handle.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// `true` if `self` and `other` share an execution lane.
    pub fn same_lane(&self, other: &Shell) -> bool {
        self.queue.same_lane(&other.queue)
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Queue `command` on this handle's lane.
    ///
    /// The command is appended immediately, even if the returned [`Pending`]
    /// is never awaited. It settles with the [`ExecResult`], or with a
    /// [`CommandError`] when the command failed (and `mayfail` is off) or
    /// an earlier command on the lane failed.
    ///
    /// Build command strings with [`cmd!`](crate::cmd) to quote arguments.
    pub fn run(&self, command: impl Into<String>) -> Pending<ExecResult, CommandError> {
        let command = command.into();
        let options = Options::clone(&self.options);
        let executor = Arc::clone(&self.executor);
        debug!(target: "bsh", command = %command, executor = executor.name(), "enqueue");
        self.queue.push(move || async move {
            let mayfail = options.is_mayfail();
            let result = executor.execute(command.clone(), options).await;
            check(result, &command, mayfail)
        })
    }

    /// Queue `command` and yield only its captured stdout.
    ///
    /// The command is appended immediately; the text is returned verbatim.
    pub fn stdoutof<C: Into<String>>(
        &self,
        command: C,
    ) -> impl Future<Output = Result<String, CommandError>> + Send + 'static + use<C> {
        let pending = self.run(command);
        async move { pending.await.map(|result| result.stdout) }
    }

    /// Wait until everything queued on this lane so far has settled.
    ///
    /// Resolves immediately on an idle lane and ignores commands queued after
    /// the call. Failures are not reported here; they go to each command's
    /// own [`Pending`].
    pub fn wait_all(&self) -> impl Future<Output = ()> + Send + 'static {
        self.queue.wait_all()
    }

    // -----------------------------------------------------------------------
    // Deriving handles
    // -----------------------------------------------------------------------

    /// A handle on the same lane with `overlay` merged onto these options.
    pub fn with(&self, overlay: Options) -> Shell {
        Shell {
            options: Arc::new(self.options.merge(&overlay)),
            queue: self.queue.clone(),
            executor: Arc::clone(&self.executor),
        }
    }

    /// Like [`Shell::with`], and call `scope` with the derived handle before
    /// returning it.
    pub fn with_scope<F>(&self, overlay: Options, scope: F) -> Shell
    where
        F: FnOnce(&Shell),
    {
        let derived = self.with(overlay);
        scope(&derived);
        derived
    }

    /// A handle with the same options on a new, independent lane.
    pub fn fork(&self) -> Shell {
        Shell {
            options: Arc::clone(&self.options),
            queue: Queue::new(),
            executor: Arc::clone(&self.executor),
        }
    }

    /// Fork, and call `scope` with the forked handle before returning it.
    pub fn fork_scope<F>(&self, scope: F) -> Shell
    where
        F: FnOnce(&Shell),
    {
        let forked = self.fork();
        scope(&forked);
        forked
    }

    /// Fork and immediately queue `command` on the new lane.
    pub fn fork_run(&self, command: impl Into<String>) -> Pending<ExecResult, CommandError> {
        self.fork().run(command)
    }

    // -----------------------------------------------------------------------
    // Option shorthands
    // -----------------------------------------------------------------------

    /// Run commands in `dir`.
    pub fn cd(&self, dir: impl Into<PathBuf>) -> Shell {
        self.with(Options {
            cd: Some(dir.into()),
            ..Default::default()
        })
    }

    /// Add environment variables.
    pub fn env<I, K, V>(&self, vars: I) -> Shell
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with(Options {
            env: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Default::default()
        })
    }

    /// Add a single environment variable.
    pub fn var(&self, key: impl Into<String>, value: impl Into<String>) -> Shell {
        self.env([(key.into(), value.into())])
    }

    /// Run as user `name`.
    pub fn user(&self, name: impl Into<String>) -> Shell {
        self.with(Options {
            user: Some(name.into()),
            ..Default::default()
        })
    }

    /// Run with group `name`.
    pub fn group(&self, name: impl Into<String>) -> Shell {
        self.with(Options {
            group: Some(name.into()),
            ..Default::default()
        })
    }

    /// Run as numeric user id `uid`.
    pub fn uid(&self, uid: u32) -> Shell {
        self.with(Options {
            uid: Some(uid),
            ..Default::default()
        })
    }

    /// Run with numeric group id `gid`.
    pub fn gid(&self, gid: u32) -> Shell {
        self.with(Options {
            gid: Some(gid),
            ..Default::default()
        })
    }

    /// Terminate commands with SIGTERM after `limit`.
    pub fn timeout(&self, limit: Duration) -> Shell {
        self.with(Options {
            timeout: Some(limit),
            ..Default::default()
        })
    }

    /// Do not echo stdout.
    pub fn quiet(&self) -> Shell {
        self.with(Options {
            quiet: Some(true),
            ..Default::default()
        })
    }

    /// Echo neither stdout nor stderr.
    pub fn silent(&self) -> Shell {
        self.with(Options {
            silent: Some(true),
            ..Default::default()
        })
    }

    /// Print each command before running it.
    pub fn echo(&self) -> Shell {
        self.with(Options {
            echo: Some(true),
            ..Default::default()
        })
    }

    /// Detach commands instead of waiting for them.
    pub fn bg(&self) -> Shell {
        self.with(Options {
            bg: Some(true),
            ..Default::default()
        })
    }

    /// Return failed results instead of failing.
    pub fn mayfail(&self) -> Shell {
        self.with(Options {
            mayfail: Some(true),
            ..Default::default()
        })
    }
}
