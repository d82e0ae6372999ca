// SPDX-License-Identifier: MIT OR Apache-2.0
use anyhow::{Context, Result};
use bsh::Shell;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Repo maintenance tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate JSON Schemas for the configuration file and option sets.
    Schema {
        /// Output directory.
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
    /// Run the CI gate: formatting, clippy and tests, in that order.
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Schema { out_dir } => schema(&out_dir),
        Command::Check => check().await,
    }
}

fn schema(out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir).context("create schema output dir")?;

    let config = schema_for!(bsh_config::ShellConfig);
    let options = schema_for!(bsh_config::Options);

    write_schema(&out_dir.join("config.schema.json"), &config)?;
    write_schema(&out_dir.join("options.schema.json"), &options)?;

    eprintln!("wrote schemas to {}", out_dir.display());
    Ok(())
}

fn write_schema(path: &Path, schema: &schemars::Schema) -> Result<()> {
    let s = serde_json::to_string_pretty(schema)?;
    std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

async fn check() -> Result<()> {
    let sh = Shell::new().echo();
    let steps = [
        sh.run("cargo fmt --all -- --check"),
        sh.run("cargo clippy --workspace --all-targets -- -D warnings"),
        sh.run("cargo test --workspace"),
    ];
    for step in steps {
        step.await.context("ci step failed")?;
    }
    Ok(())
}
