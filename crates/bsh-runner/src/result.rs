// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outcome of one command execution.

use serde::{Serialize, Serializer};
use std::io;
use std::sync::Arc;

/// Failure to create the child process at all.
///
/// Cheap to clone so a single failure can be delivered to every unit linked
/// behind it in a queue.
#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct SpawnError(Arc<io::Error>);

impl SpawnError {
    /// Wrap an I/O error raised while spawning.
    pub fn new(err: io::Error) -> Self {
        Self(Arc::new(err))
    }

    /// Build a spawn error from a kind and message, e.g. for an unknown user.
    pub fn other(kind: io::ErrorKind, msg: impl Into<String>) -> Self {
        Self::new(io::Error::new(kind, msg.into()))
    }

    /// Kind of the underlying I/O error.
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }

    /// `true` when the program (or working directory) does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }

    /// Raw OS error code, if the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.0.raw_os_error()
    }
}

impl From<io::Error> for SpawnError {
    fn from(err: io::Error) -> Self {
        Self::new(err)
    }
}

impl Serialize for SpawnError {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(&self.0)
    }
}

/// Everything observed about a finished (or detached) command.
///
/// Exactly one of `error`, `signal` and `status` is set for a foreground
/// command. A detached command has none of them and `detached == true`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecResult {
    /// Process id, absent when spawning failed.
    pub pid: Option<u32>,
    /// Captured stdout, lossily decoded as UTF-8. Empty when detached.
    pub stdout: String,
    /// Captured stderr, lossily decoded as UTF-8. Empty when detached.
    pub stderr: String,
    /// Exit status for a normal exit.
    pub status: Option<i32>,
    /// Signal name (e.g. `"SIGTERM"`) when the child was killed by a signal.
    pub signal: Option<String>,
    /// Spawn failure, if the child never started.
    pub error: Option<SpawnError>,
    /// The child was started in the background and not awaited.
    pub detached: bool,
}

impl ExecResult {
    /// The `[stdin, stdout, stderr]` triple. Stdin is never captured, so the
    /// first slot is always `None`.
    pub fn output(&self) -> [Option<&str>; 3] {
        [None, Some(&self.stdout), Some(&self.stderr)]
    }

    /// `true` for a normal exit with status 0.
    pub fn success(&self) -> bool {
        self.error.is_none() && self.signal.is_none() && self.status == Some(0)
    }
}
