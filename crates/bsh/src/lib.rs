// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequenced shell command handles.
//!
//! ```no_run
//! # async fn demo() -> Result<(), bsh::CommandError> {
//! use bsh::{Shell, cmd};
//!
//! let sh = Shell::new();
//! let file = "my file.txt";
//! let _ = sh.run(cmd!("touch {}", file));
//! let _ = sh.quiet().run(cmd!("ls -l {}", file));
//! let listing = sh.stdoutof("ls").await?;
//! sh.wait_all().await;
//! # let _ = listing;
//! # Ok(())
//! # }
//! ```
//!
//! Commands submitted to one [`Shell`] run strictly one after another.
//! [`Shell::fork`] opens a second lane that runs alongside the first.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod executor;
mod shell;

pub use executor::{Executor, ProcessExecutor};
pub use shell::Shell;

pub use bsh_config::{Options, ShellConfig};
pub use bsh_interp::{Arg, Template, cmd, interpolate, quote, raw, squote};
pub use bsh_queue::{Abandoned, Pending};
pub use bsh_runner::{CommandError, ExecResult, ShellProgram, SpawnError};
