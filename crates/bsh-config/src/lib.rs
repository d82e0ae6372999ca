// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution options and configuration loading for bshell.
//!
//! [`Options`] is the per-call option set that handles merge together.
//! [`ShellConfig`] is the file-level configuration: the global default
//! options, the log level and the shell program, loaded from TOML with
//! `BSH_*` environment overrides on top.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod options;

pub use options::{Options, Resolved};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file or an override could not be parsed.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// `quiet` is set alongside `silent`, which already implies it.
    RedundantQuiet,
    /// Both a name and a numeric id are set; the numeric id wins.
    IdShadowsName {
        /// `"user"` or `"group"`.
        field: &'static str,
    },
    /// The default timeout is unusually large.
    LargeTimeout {
        /// Timeout in milliseconds.
        millis: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::RedundantQuiet => {
                write!(f, "'quiet' is redundant when 'silent' is set")
            }
            ConfigWarning::IdShadowsName { field } => {
                let id = if *field == "user" { "uid" } else { "gid" };
                write!(f, "'{id}' overrides '{field}'; the name is ignored")
            }
            ConfigWarning::LargeTimeout { millis } => {
                write!(f, "default timeout is large ({millis}ms)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShellConfig {
    /// Log level for the `bsh` binary (e.g. `"debug"`, `"info"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Shell program used to interpret command strings (default `sh`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Global default options; every handle starts from these.
    #[serde(default)]
    pub defaults: Options,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".into()),
            shell: None,
            defaults: Options::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Threshold above which a default timeout generates a warning (1 hour).
const LARGE_TIMEOUT_MS: u64 = 3_600_000;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ShellConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ShellConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<ShellConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ShellConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a TOML string into a [`ShellConfig`].
pub fn parse_toml(content: &str) -> Result<ShellConfig, ConfigError> {
    toml::from_str::<ShellConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply overrides from the process environment.
///
/// Recognised variables:
/// - `BSH_LOG_LEVEL`
/// - `BSH_SHELL`
/// - `BSH_TIMEOUT_MS`
/// - `BSH_ECHO` (`1`/`true`/`0`/`false`)
pub fn apply_env_overrides(config: &mut ShellConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply `BSH_*` overrides read through `lookup`.
pub fn apply_overrides_from<F>(config: &mut ShellConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("BSH_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Some(val) = lookup("BSH_SHELL") {
        config.shell = Some(val);
    }
    if let Some(val) = lookup("BSH_TIMEOUT_MS") {
        let ms = val.trim().parse::<u64>().map_err(|e| ConfigError::ParseError {
            reason: format!("BSH_TIMEOUT_MS={val:?}: {e}"),
        })?;
        config.defaults.timeout = Some(Duration::from_millis(ms));
    }
    if let Some(val) = lookup("BSH_ECHO") {
        config.defaults.echo = Some(parse_bool("BSH_ECHO", &val)?);
    }
    Ok(())
}

fn parse_bool(key: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::ParseError {
            reason: format!("{key}={val:?} is not a boolean"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unknown log level, empty shell, zero timeout, malformed env
/// keys) come back as [`ConfigError::ValidationError`].
pub fn validate_config(config: &ShellConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if let Some(ref shell) = config.shell
        && shell.trim().is_empty()
    {
        errors.push("shell must not be empty".into());
    }

    let defaults = &config.defaults;
    if let Some(t) = defaults.timeout {
        let millis = t.as_millis() as u64;
        if millis == 0 {
            errors.push("timeout_ms must be greater than zero".into());
        } else if millis > LARGE_TIMEOUT_MS {
            warnings.push(ConfigWarning::LargeTimeout { millis });
        }
    }

    for key in defaults.env.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            errors.push(format!("invalid environment variable name {key:?}"));
        }
    }

    if defaults.quiet.is_some() && defaults.is_silent() {
        warnings.push(ConfigWarning::RedundantQuiet);
    }
    if defaults.user.is_some() && defaults.uid.is_some() {
        warnings.push(ConfigWarning::IdShadowsName { field: "user" });
    }
    if defaults.group.is_some() && defaults.gid.is_some() {
        warnings.push(ConfigWarning::IdShadowsName { field: "group" });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`;
/// default options merge with [`Options::merge`].
pub fn merge_configs(base: ShellConfig, overlay: ShellConfig) -> ShellConfig {
    ShellConfig {
        log_level: overlay.log_level.or(base.log_level),
        shell: overlay.shell.or(base.shell),
        defaults: base.defaults.merge(&overlay.defaults),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let warnings = validate_config(&ShellConfig::default()).expect("default is valid");
        assert!(warnings.is_empty());
    }

    #[test]
    fn parse_valid_toml_string() {
        let toml = r#"
            log_level = "debug"
            shell = "bash"

            [defaults]
            cd = "/srv"
            timeout_ms = 2500
            quiet = true

            [defaults.env]
            RUST_LOG = "trace"
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.shell.as_deref(), Some("bash"));
        assert_eq!(cfg.defaults.cd, Some("/srv".into()));
        assert_eq!(cfg.defaults.timeout, Some(Duration::from_millis(2500)));
        assert!(cfg.defaults.is_quiet());
        assert_eq!(cfg.defaults.env["RUST_LOG"], "trace");
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn parse_unknown_option_gives_parse_error() {
        let err = parse_toml("[defaults]\ncwd = \"/tmp\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn load_missing_file_is_file_not_found() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[defaults]\nmayfail = true").unwrap();
        let cfg = load_config(Some(f.path())).unwrap();
        assert!(cfg.defaults.is_mayfail());
    }

    #[test]
    fn validation_catches_invalid_log_level() {
        let cfg = ShellConfig {
            log_level: Some("verbose".into()),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validation_catches_zero_timeout_and_bad_env_key() {
        let mut cfg = ShellConfig::default();
        cfg.defaults.timeout = Some(Duration::ZERO);
        cfg.defaults.env.insert("A=B".into(), "x".into());
        match validate_config(&cfg).unwrap_err() {
            ConfigError::ValidationError { reasons } => {
                assert_eq!(reasons.len(), 2);
                assert!(reasons.iter().any(|r| r.contains("timeout_ms")));
                assert!(reasons.iter().any(|r| r.contains("A=B")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validation_warns_on_shadowed_names_and_redundant_quiet() {
        let mut cfg = ShellConfig::default();
        cfg.defaults.user = Some("nobody".into());
        cfg.defaults.uid = Some(65534);
        cfg.defaults.quiet = Some(true);
        cfg.defaults.silent = Some(true);
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.contains(&ConfigWarning::IdShadowsName { field: "user" }));
        assert!(warnings.contains(&ConfigWarning::RedundantQuiet));
    }

    #[test]
    fn large_timeout_produces_warning() {
        let mut cfg = ShellConfig::default();
        cfg.defaults.timeout = Some(Duration::from_secs(7200));
        let warnings = validate_config(&cfg).unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::LargeTimeout { .. }))
        );
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = ShellConfig::default();
        apply_overrides_from(
            &mut cfg,
            lookup(&[
                ("BSH_LOG_LEVEL", "trace"),
                ("BSH_SHELL", "/bin/bash"),
                ("BSH_TIMEOUT_MS", "750"),
                ("BSH_ECHO", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("trace"));
        assert_eq!(cfg.shell.as_deref(), Some("/bin/bash"));
        assert_eq!(cfg.defaults.timeout, Some(Duration::from_millis(750)));
        assert!(cfg.defaults.is_echo());
    }

    #[test]
    fn bad_timeout_override_is_parse_error() {
        let mut cfg = ShellConfig::default();
        let err = apply_overrides_from(&mut cfg, lookup(&[("BSH_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn bad_echo_override_is_parse_error() {
        let mut cfg = ShellConfig::default();
        let err = apply_overrides_from(&mut cfg, lookup(&[("BSH_ECHO", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("BSH_ECHO"));
    }

    #[test]
    fn merge_overlay_overrides_base() {
        let base = ShellConfig {
            log_level: Some("info".into()),
            shell: Some("sh".into()),
            ..Default::default()
        };
        let overlay = ShellConfig {
            log_level: None,
            shell: Some("bash".into()),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.log_level.as_deref(), Some("info"));
        assert_eq!(merged.shell.as_deref(), Some("bash"));
    }

    #[test]
    fn warning_display() {
        assert_eq!(
            ConfigWarning::IdShadowsName { field: "group" }.to_string(),
            "'gid' overrides 'group'; the name is ignored"
        );
    }
}
