// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations for the `bsh` binary.

use anyhow::{Context, Result};
use bsh::{CommandError, ExecResult, Options, Shell};
use bsh_config::ShellConfig;
use bsh_runner::Signal;
use clap::Args;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-invocation option flags shared by `run` and `script`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Working directory for the command.
    #[arg(long)]
    cd: Option<PathBuf>,

    /// Environment variable as KEY=VALUE. Can be repeated.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env_vars: Vec<String>,

    /// Run as this user.
    #[arg(long)]
    user: Option<String>,

    /// Run with this group.
    #[arg(long)]
    group: Option<String>,

    /// Send SIGTERM after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Do not echo stdout.
    #[arg(long)]
    quiet: bool,

    /// Echo neither stdout nor stderr.
    #[arg(long)]
    silent: bool,

    /// Print each command before running it.
    #[arg(long)]
    echo: bool,

    /// Detach the command and return immediately.
    #[arg(long)]
    bg: bool,

    /// Exit successfully even if the command fails.
    #[arg(long)]
    mayfail: bool,
}

impl RunArgs {
    /// Convert flags into an option overlay. Unset flags stay unset so
    /// configured defaults show through.
    pub fn to_options(&self) -> Result<Options> {
        Ok(Options {
            cd: self.cd.clone(),
            env: parse_env_vars(&self.env_vars)?,
            bg: self.bg.then_some(true),
            user: self.user.clone(),
            group: self.group.clone(),
            uid: None,
            gid: None,
            mayfail: self.mayfail.then_some(true),
            timeout: self.timeout_ms.map(Duration::from_millis),
            quiet: self.quiet.then_some(true),
            silent: self.silent.then_some(true),
            echo: self.echo.then_some(true),
        })
    }
}

/// Parse `KEY=VALUE` pairs.
pub fn parse_env_vars(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|kv| {
            let (k, v) = kv
                .split_once('=')
                .with_context(|| format!("invalid --env '{kv}', expected KEY=VALUE"))?;
            anyhow::ensure!(!k.is_empty(), "invalid --env '{kv}', empty key");
            Ok((k.to_string(), v.to_string()))
        })
        .collect()
}

/// Exit code mirroring a shell: the status itself, 128 + signal number when
/// signaled, 1 when the command could not be started, 0 when detached.
pub fn exit_code(result: &ExecResult) -> u8 {
    if result.error.is_some() {
        return 1;
    }
    if let Some(name) = &result.signal {
        let signo = name.parse::<Signal>().map(|s| s as i32).unwrap_or(0);
        return u8::try_from(128 + signo).unwrap_or(1);
    }
    match result.status {
        Some(code) => u8::try_from(code).unwrap_or(1),
        None => 0,
    }
}

/// Root handle for a validated config. Invalid configs are refused the same
/// way `config check` refuses them.
fn root_shell(config: &ShellConfig) -> Result<Shell> {
    let warnings = bsh_config::validate_config(config).context("invalid config")?;
    for w in warnings {
        warn!(target: "bsh", "config: {w}");
    }
    Ok(Shell::from_config(config))
}

fn report(err: &CommandError) -> u8 {
    match err.command() {
        Some(command) => eprintln!("bsh: {err}: {command}"),
        None => eprintln!("bsh: {err}"),
    }
    err.result().map(exit_code).filter(|c| *c != 0).unwrap_or(1)
}

pub async fn cmd_run(
    config: &ShellConfig,
    args: RunArgs,
    words: Vec<String>,
    json: bool,
) -> Result<ExitCode> {
    let shell = root_shell(config)?.with(args.to_options()?);
    let command = words.join(" ");
    debug!(target: "bsh", %command, "run");

    let outcome = shell.run(command).await;
    let (result, code) = match &outcome {
        Ok(result) => {
            let code = if shell.options().is_mayfail() {
                0
            } else {
                exit_code(result)
            };
            (Some(result), code)
        }
        Err(err) => (err.result(), report(err)),
    };

    if json && let Some(result) = result {
        println!(
            "{}",
            serde_json::to_string_pretty(result).context("serialize result")?
        );
    }
    Ok(ExitCode::from(code))
}

/// Non-blank, non-comment lines of a script.
pub fn script_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

pub async fn cmd_script(
    config: &ShellConfig,
    args: RunArgs,
    file: &Path,
    keep_going: bool,
) -> Result<ExitCode> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("read script {}", file.display()))?;

    let mut shell = root_shell(config)?.with(args.to_options()?);
    if keep_going {
        shell = shell.mayfail();
    }

    let lines = script_lines(&text);
    info!(target: "bsh", lines = lines.len(), script = %file.display(), "running script");
    let pending: Vec<_> = lines.iter().map(|line| shell.run(*line)).collect();

    let mut failures = 0usize;
    for p in pending {
        match p.await {
            Ok(result) if keep_going && !result.success() && !result.detached => {
                failures += 1;
                warn!(target: "bsh", code = exit_code(&result), "line failed");
            }
            Ok(_) => {}
            Err(err) => return Ok(ExitCode::from(report(&err))),
        }
    }

    if failures > 0 {
        eprintln!("bsh: {failures} line(s) failed");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

pub fn cmd_config_check(path: Option<&Path>) -> Result<ExitCode> {
    let Some(path) = path else {
        anyhow::bail!("no config file given; pass one or use --config");
    };
    let config = match bsh_config::load_config(Some(path)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(ExitCode::from(1));
        }
    };
    match bsh_config::validate_config(&config) {
        Ok(warnings) => {
            for w in &warnings {
                println!("warning: {w}");
            }
            println!("ok: {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("error: {err}");
            Ok(ExitCode::from(1))
        }
    }
}

pub fn cmd_config_show(config: &ShellConfig) -> Result<ExitCode> {
    let text = toml::to_string_pretty(config).context("serialize config")?;
    print!("{text}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_parse() {
        let vars = parse_env_vars(&["A=1".into(), "B=x=y".into()]).unwrap();
        assert_eq!(vars.get("A").map(String::as_str), Some("1"));
        assert_eq!(vars.get("B").map(String::as_str), Some("x=y"));
    }

    #[test]
    fn env_var_without_equals_is_rejected() {
        assert!(parse_env_vars(&["NOPE".into()]).is_err());
        assert!(parse_env_vars(&["=v".into()]).is_err());
    }

    #[test]
    fn unset_flags_stay_unset() {
        let opts = RunArgs::default().to_options().unwrap();
        assert_eq!(opts, Options::default());
    }

    #[test]
    fn exit_codes_mirror_a_shell() {
        let status = |s| ExecResult {
            status: Some(s),
            ..Default::default()
        };
        assert_eq!(exit_code(&status(0)), 0);
        assert_eq!(exit_code(&status(3)), 3);

        let signaled = ExecResult {
            signal: Some("SIGTERM".into()),
            ..Default::default()
        };
        assert_eq!(exit_code(&signaled), 143);

        let detached = ExecResult {
            detached: true,
            ..Default::default()
        };
        assert_eq!(exit_code(&detached), 0);
    }

    #[test]
    fn invalid_config_refuses_a_root_shell() {
        let config = ShellConfig {
            log_level: Some("loud".into()),
            ..Default::default()
        };
        let err = root_shell(&config).unwrap_err();
        assert!(format!("{err:#}").contains("invalid log_level"));
        assert!(root_shell(&ShellConfig::default()).is_ok());
    }

    #[test]
    fn script_lines_skip_blanks_and_comments() {
        let text = "# header\n\necho one\n   \n  # indented comment\necho two\n";
        assert_eq!(script_lines(text), ["echo one", "echo two"]);
    }
}
