// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-call execution option set and its merge rules.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Options controlling how a single command is executed.
///
/// Every field is optional: an absent field inherits from whatever the set is
/// merged onto. A handle's effective options are
/// `global.merge(ancestor).merge(local)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Options {
    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cd: Option<PathBuf>,

    /// Environment overlay applied on top of the inherited environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Detach the child and return without waiting for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<bool>,

    /// Run as this user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Run with this group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Run as this numeric user id. Takes precedence over `user`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,

    /// Run with this numeric group id. Takes precedence over `group`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,

    /// Return failed results instead of raising an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mayfail: Option<bool>,

    /// Send SIGTERM to the child after this long.
    #[serde(
        rename = "timeout_ms",
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_duration_millis"
    )]
    #[schemars(with = "Option<u64>")]
    pub timeout: Option<Duration>,

    /// Do not echo the child's stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet: Option<bool>,

    /// Echo neither stdout nor stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,

    /// Print the command string before running it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<bool>,
}

/// [`Options`] with every flag collapsed to a concrete value.
///
/// Produced by [`Options::resolve`] once a handle's layers have been merged.
/// Absent flags are `false`; `silent` implies `quiet`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Working directory for the child process.
    pub cd: Option<PathBuf>,
    /// Environment overlay.
    pub env: BTreeMap<String, String>,
    /// User name to run as.
    pub user: Option<String>,
    /// Group name to run with.
    pub group: Option<String>,
    /// Numeric user id.
    pub uid: Option<u32>,
    /// Numeric group id.
    pub gid: Option<u32>,
    /// SIGTERM deadline measured from spawn.
    pub timeout: Option<Duration>,
    /// Detach the child.
    pub bg: bool,
    /// Return failed results instead of raising.
    pub mayfail: bool,
    /// Suppress stdout echo.
    pub quiet: bool,
    /// Suppress stdout and stderr echo.
    pub silent: bool,
    /// Print the command string first.
    pub echo: bool,
}

/// Serde helper for `Option<Duration>` as integer milliseconds.
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match val {
            Some(d) => (d.as_millis() as u64).serialize(ser),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(de)?;
        Ok(opt.map(Duration::from_millis))
    }
}

impl Options {
    /// Merge `overlay` onto `self`.
    ///
    /// Fields set in `overlay` win; `env` is merged key by key with overlay
    /// keys winning. The operation is associative and `Options::default()`
    /// is its identity on both sides.
    pub fn merge(&self, overlay: &Options) -> Options {
        let mut env = self.env.clone();
        env.extend(overlay.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        Options {
            cd: overlay.cd.clone().or_else(|| self.cd.clone()),
            env,
            bg: overlay.bg.or(self.bg),
            user: overlay.user.clone().or_else(|| self.user.clone()),
            group: overlay.group.clone().or_else(|| self.group.clone()),
            uid: overlay.uid.or(self.uid),
            gid: overlay.gid.or(self.gid),
            mayfail: overlay.mayfail.or(self.mayfail),
            timeout: overlay.timeout.or(self.timeout),
            quiet: overlay.quiet.or(self.quiet),
            silent: overlay.silent.or(self.silent),
            echo: overlay.echo.or(self.echo),
        }
    }

    /// Collapse the optional flags into a [`Resolved`] set.
    pub fn resolve(&self) -> Resolved {
        Resolved {
            cd: self.cd.clone(),
            env: self.env.clone(),
            user: self.user.clone(),
            group: self.group.clone(),
            uid: self.uid,
            gid: self.gid,
            timeout: self.timeout,
            bg: self.is_bg(),
            mayfail: self.is_mayfail(),
            quiet: self.is_quiet(),
            silent: self.is_silent(),
            echo: self.is_echo(),
        }
    }

    /// `true` if the child should be detached.
    pub fn is_bg(&self) -> bool {
        self.bg.unwrap_or(false)
    }

    /// `true` if failures are returned instead of raised.
    pub fn is_mayfail(&self) -> bool {
        self.mayfail.unwrap_or(false)
    }

    /// `true` if stdout echo is suppressed (directly or via `silent`).
    pub fn is_quiet(&self) -> bool {
        self.quiet.unwrap_or(false) || self.is_silent()
    }

    /// `true` if both stdout and stderr echo are suppressed.
    pub fn is_silent(&self) -> bool {
        self.silent.unwrap_or(false)
    }

    /// `true` if the command string is printed before running.
    pub fn is_echo(&self) -> bool {
        self.echo.unwrap_or(false)
    }
}
