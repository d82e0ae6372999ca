// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
mod commands;

use anyhow::{Context, Result};
use bsh_config::ShellConfig;
use clap::{Parser, Subcommand};
use commands::RunArgs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bsh", version, about = "Sequenced shell command runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one command and exit with its status.
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Print the result as JSON after the command finishes.
        #[arg(long)]
        json: bool,

        /// Command words, joined with spaces into one shell command.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Run every line of a script file in order.
    Script {
        #[command(flatten)]
        args: RunArgs,

        /// Keep going after a failing line.
        #[arg(long)]
        keep_going: bool,

        /// Script file; blank lines and `#` comments are skipped.
        file: PathBuf,
    },

    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate a configuration file and print warnings.
    Check {
        /// File to check (defaults to `--config`).
        file: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML.
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load(cli.config.as_deref())?;

    let filter = if cli.debug {
        EnvFilter::new("bsh=debug,bsh.runner=debug,bsh.queue=debug")
    } else {
        let level = config.log_level.as_deref().unwrap_or("info");
        EnvFilter::new(format!("bsh={level}"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            args,
            json,
            command,
        } => commands::cmd_run(&config, args, command, json).await,
        Commands::Script {
            args,
            keep_going,
            file,
        } => commands::cmd_script(&config, args, &file, keep_going).await,
        Commands::Config { action } => match action {
            ConfigAction::Check { file } => {
                commands::cmd_config_check(file.as_deref().or(cli.config.as_deref()))
            }
            ConfigAction::Show => commands::cmd_config_show(&config),
        },
    }
}

/// Load the config file (if any) with `BSH_*` environment overrides applied.
fn load(path: Option<&std::path::Path>) -> Result<ShellConfig> {
    bsh_config::load_config(path).context("load config")
}
