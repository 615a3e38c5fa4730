//! Optional config file with defaults for the command line.
//!
//! Flat `key = value` lines; strings are double-quoted, `#` starts a comment.
//!
//! ```text
//! output_dir = "/srv/contest-logs"
//! max_concurrent = 20   # be gentle with the archive
//! max_retries = 5
//! overwrite = "skip"
//! index_url = "https://cqww.com/publiclogs/"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cqww_core::OverwritePolicy;
use cqww_core::selection::parse_page_url;
use url::Url;

const APP_DIR: &str = "cqww-downloader";

/// Values read from the config file. Unset keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default download gate width.
    pub max_concurrent: Option<usize>,
    /// Default retries per file.
    pub max_retries: Option<u32>,
    /// Default overwrite policy.
    pub overwrite: Option<OverwritePolicy>,
    /// Archive index URL.
    pub index_url: Option<Url>,
}

impl FileConfig {
    /// Validates values the parser cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        if let Some(max_concurrent) = self.max_concurrent
            && max_concurrent < 1
        {
            bail!(
                "Invalid config value for `max_concurrent`: {max_concurrent}. Expected at least 1"
            );
        }
        Ok(())
    }
}

/// Resolves the config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/cqww-downloader/config.toml`
/// 2. `$HOME/.config/cqww-downloader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional and yields an
/// empty config when absent.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "output_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `output_dir` value on line {line_no}"))?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "max_concurrent" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `max_concurrent` value on line {line_no}"))?;
                let n = usize::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_concurrent out of range"))?;
                cfg.max_concurrent = Some(n);
            }
            "max_retries" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `max_retries` value on line {line_no}"))?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_retries out of range for u32"))?;
                cfg.max_retries = Some(n);
            }
            "overwrite" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `overwrite` value on line {line_no}"))?;
                let policy = parsed.parse::<OverwritePolicy>().with_context(|| {
                    format!("Invalid `overwrite` value '{parsed}' on line {line_no}")
                })?;
                cfg.overwrite = Some(policy);
            }
            "index_url" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `index_url` value on line {line_no}"))?;
                let url = parse_page_url(&parsed)
                    .with_context(|| format!("Invalid `index_url` value on line {line_no}"))?;
                cfg.index_url = Some(url);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
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
