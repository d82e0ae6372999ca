// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command failures and the pass/fail policy.

use crate::result::{ExecResult, SpawnError};
use bsh_queue::Abandoned;

/// A command that did not succeed, carrying its full result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    /// The child could not be created.
    #[error("failed to execute command")]
    Spawn {
        /// Command string as submitted.
        command: String,
        /// Result with `error` set.
        result: Box<ExecResult>,
        /// Underlying spawn failure.
        #[source]
        cause: SpawnError,
    },

    /// The child was terminated by a signal.
    #[error("shell process terminated with signal {signal}")]
    Signaled {
        /// Command string as submitted.
        command: String,
        /// Result with `signal` set.
        result: Box<ExecResult>,
        /// Signal name, e.g. `SIGTERM`.
        signal: String,
    },

    /// The child exited with a non-zero status.
    #[error("shell process returned non-zero exit code - {status}")]
    NonZeroExit {
        /// Command string as submitted.
        command: String,
        /// Result with `status` set.
        result: Box<ExecResult>,
        /// Exit status.
        status: i32,
    },

    /// The queued unit was dropped before it produced a result.
    #[error(transparent)]
    Abandoned(#[from] Abandoned),
}

impl CommandError {
    /// The result of the failed command, if it ran far enough to have one.
    pub fn result(&self) -> Option<&ExecResult> {
        match self {
            Self::Spawn { result, .. }
            | Self::Signaled { result, .. }
            | Self::NonZeroExit { result, .. } => Some(result),
            Self::Abandoned(_) => None,
        }
    }

    /// The command string that failed.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Spawn { command, .. }
            | Self::Signaled { command, .. }
            | Self::NonZeroExit { command, .. } => Some(command),
            Self::Abandoned(_) => None,
        }
    }

    /// Exit status for [`CommandError::NonZeroExit`].
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Signal name for [`CommandError::Signaled`].
    pub fn signal(&self) -> Option<&str> {
        match self {
            Self::Signaled { signal, .. } => Some(signal),
            _ => None,
        }
    }
}

/// Apply the pass/fail policy to a finished command.
///
/// Under `mayfail` the result is always returned. Otherwise a spawn error,
/// a terminating signal or a non-zero status (checked in that order) is
/// raised as a [`CommandError`]. Detached results always pass.
pub fn check(result: ExecResult, command: &str, mayfail: bool) -> Result<ExecResult, CommandError> {
    if mayfail {
        return Ok(result);
    }
    if let Some(cause) = result.error.clone() {
        return Err(CommandError::Spawn {
            command: command.to_string(),
            result: Box::new(result),
            cause,
        });
    }
    if let Some(signal) = result.signal.clone() {
        return Err(CommandError::Signaled {
            command: command.to_string(),
            result: Box::new(result),
            signal,
        });
    }
    if let Some(status) = result.status
        && status != 0
    {
        return Err(CommandError::NonZeroExit {
            command: command.to_string(),
            result: Box::new(result),
            status,
        });
    }
    Ok(result)
}
