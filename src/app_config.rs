//! Application configuration loading and layering for the CLI.
//!
//! Precedence: built-in defaults < config file < environment < flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use drivefetch_core::FetchConfig;
use drivefetch_core::config::API_KEY_ENV;

use crate::cli::Args;

/// TOML-style flat `key = value` file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default storage directory.
    pub output_dir: Option<PathBuf>,
    /// Minimum plausible file size in bytes.
    pub min_file_size: Option<u64>,
    /// Declared length above which a 200 response is accepted.
    pub accept_length_threshold: Option<u64>,
    /// Seconds allowed until response headers arrive.
    pub request_timeout_secs: Option<u64>,
    /// Maximum redirects per request.
    pub max_redirects: Option<u64>,
    /// Drive API key enabling the API endpoint.
    pub api_key: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.request_timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!(
                "Invalid config value for `request_timeout_secs`: {timeout}. Expected range: 1..=3600"
            );
        }
        if let Some(redirects) = self.max_redirects
            && redirects > 50
        {
            bail!("Invalid config value for `max_redirects`: {redirects}. Expected range: 0..=50");
        }
        if let Some(size) = self.min_file_size
            && size > 100 * 1024 * 1024
        {
            bail!(
                "Invalid config value for `min_file_size`: {size}. Expected at most 104857600 bytes"
            );
        }
        Ok(())
    }
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Default tracing filter for this setting.
    #[must_use]
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/drivefetch/config.toml`
/// 2. `$HOME/.config/drivefetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("drivefetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("drivefetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` or the default path, if present.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(Some(config))
}

/// Merges file config, environment and flags into a [`FetchConfig`].
pub fn build_fetch_config(
    args: &Args,
    file: Option<&FileConfig>,
    env_api_key: Option<String>,
) -> FetchConfig {
    let mut config = FetchConfig::default();
    if let Some(file) = file {
        if let Some(dir) = &file.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(size) = file.min_file_size {
            config.min_file_size = size;
        }
        if let Some(threshold) = file.accept_length_threshold {
            config.accept_length_threshold = threshold;
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(redirects) = file.max_redirects {
            config.max_redirects = usize::try_from(redirects).unwrap_or(config.max_redirects);
        }
        if file.api_key.is_some() {
            config.api_key.clone_from(&file.api_key);
        }
    }

    if let Some(key) = env_api_key.filter(|k| !k.trim().is_empty()) {
        config.api_key = Some(key);
    }

    if let Some(dir) = &args.output_dir {
        config.output_dir.clone_from(dir);
    }
    if let Some(size) = args.min_size {
        config.min_file_size = size;
    }
    if let Some(secs) = args.timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
    if args.api_key.is_some() {
        config.api_key.clone_from(&args.api_key);
    }
    config
}

/// Reads the API key from the environment.
#[must_use]
pub fn env_api_key() -> Option<String> {
    env::var(API_KEY_ENV).ok()
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "output_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `output_dir` value on line {line_no}"))?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "min_file_size" => {
                cfg.min_file_size = Some(
                    parse_integer_u64(value)
                        .with_context(|| format!("Invalid `min_file_size` value on line {line_no}"))?,
                );
            }
            "accept_length_threshold" => {
                cfg.accept_length_threshold = Some(parse_integer_u64(value).with_context(|| {
                    format!("Invalid `accept_length_threshold` value on line {line_no}")
                })?);
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_integer_u64(value).with_context(|| {
                    format!("Invalid `request_timeout_secs` value on line {line_no}")
                })?);
            }
            "max_redirects" => {
                cfg.max_redirects = Some(
                    parse_integer_u64(value)
                        .with_context(|| format!("Invalid `max_redirects` value on line {line_no}"))?,
                );
            }
            "api_key" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `api_key` value on line {line_no}"))?;
                cfg.api_key = Some(parsed).filter(|k| !k.is_empty());
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `verbosity` value on line {line_no}"))?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value on line {line_no}")
                })?);
            }
            other => bail!("Unknown config key `{other}` on line {line_no}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
min_file_size = 2048
verbosity = "verbose"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.min_file_size, Some(2048));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
api_key = "abc#def" # key with a hash inside quotes
request_timeout_secs = 45 # slower links
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.api_key.as_deref(), Some("abc#def"));
        assert_eq!(cfg.request_timeout_secs, Some(45));
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key expected");
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_zero_timeout() {
        let err = parse_config_str("request_timeout_secs = 0").expect_err("invalid timeout");
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_trailing_tokens() {
        let err = parse_config_str("min_file_size = 4 trailing").expect_err("trailing token");
        assert!(format!("{err:#}").contains("min_file_size"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        assert!(parse_config_str("output_dir = /tmp/videos").is_err());
    }

    #[test]
    fn test_load_file_config_from_explicit_path() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "output_dir = \"/srv/videos\"\n").expect("write config");
        let cfg = load_file_config(Some(&path))
            .expect("load should succeed")
            .expect("config should exist");
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/srv/videos")));
    }

    #[test]
    fn test_flags_override_file_and_env() {
        let file = FileConfig {
            output_dir: Some(PathBuf::from("/from/file")),
            min_file_size: Some(10),
            api_key: Some("file-key".to_string()),
            ..FileConfig::default()
        };
        let args = Args::try_parse_from([
            "drivefetch",
            "some-id",
            "--output-dir",
            "/from/flag",
            "--api-key",
            "flag-key",
        ])
        .expect("args parse");
        let config = build_fetch_config(&args, Some(&file), Some("env-key".to_string()));
        assert_eq!(config.output_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.min_file_size, 10);
        assert_eq!(config.api_key.as_deref(), Some("flag-key"));
    }

    #[test]
    fn test_env_key_overrides_file_key() {
        let file = FileConfig {
            api_key: Some("file-key".to_string()),
            ..FileConfig::default()
        };
        let args = Args::try_parse_from(["drivefetch", "some-id"]).expect("args parse");
        let config = build_fetch_config(&args, Some(&file), Some("env-key".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let args = Args::try_parse_from(["drivefetch", "some-id"]).expect("args parse");
        assert_eq!(build_fetch_config(&args, None, None), FetchConfig::default());
    }
}
