// SPDX-License-Identifier: MIT OR Apache-2.0
//! bshell: run shell commands from async Rust, one after another.
//!
//! This crate re-exports the handle API from [`bsh`] at the top level and
//! each building block under its own module:
//!
//! - [`interp`]: quoting and `{}` templates for command strings
//! - [`queue`]: the strictly ordered work lane behind every handle
//! - [`runner`]: spawning, output capture, timeouts, exit classification
//! - [`config`]: option sets and the TOML configuration file
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use bsh::*;

pub use bsh_config as config;
pub use bsh_interp as interp;
pub use bsh_queue as queue;
pub use bsh_runner as runner;
