//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file. Every field has a
//! built-in default, so a missing file is never fatal.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SXKCD_CONFIG`)
//! 3. User config file (`~/.config/sxkcd/config.toml`)
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SXKCD_CONFIG";

pub const DEFAULT_XKCD_BASE_URL: &str = "https://xkcd.com";
pub const DEFAULT_EXPLAIN_BASE_URL: &str = "https://www.explainxkcd.com/wiki/api.php";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the xkcd JSON API
    #[serde(default = "default_xkcd_base_url")]
    pub xkcd_base_url: String,

    /// MediaWiki API endpoint of explainxkcd
    #[serde(default = "default_explain_base_url")]
    pub explain_base_url: String,

    /// Overall per-request HTTP timeout
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Largest accepted response body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Total attempts per request (first try included)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Sleep before the first retry; doubles on each further retry
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Maximum comics fetched concurrently during a batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Where `all` writes the comic archive
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Period of the latest-comic watcher
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            xkcd_base_url: default_xkcd_base_url(),
            explain_base_url: default_explain_base_url(),
            http_timeout_secs: default_http_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            concurrency: default_concurrency(),
            output_file: default_output_file(),
            watch_interval_secs: default_watch_interval_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_xkcd_base_url() -> String {
    DEFAULT_XKCD_BASE_URL.to_string()
}

fn default_explain_base_url() -> String {
    DEFAULT_EXPLAIN_BASE_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> u64 {
    15 * 1024 * 1024
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    60
}

fn default_output_file() -> PathBuf {
    PathBuf::from("data/comics.json")
}

fn default_watch_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a config file path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// Resolves which config file (if any) to load
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Pick the config file path by priority.
    ///
    /// Returns `None` when no explicit file was named and the user config
    /// file does not exist.
    pub fn resolve(&self) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = &self.cli_path {
            return Some((path.clone(), ConfigSource::CommandLine));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        user_config_path()
            .filter(|p| p.exists())
            .map(|p| (p, ConfigSource::UserConfigDir))
    }

    /// Resolve and load the configuration.
    ///
    /// Falls back to defaults when no file was found. A file that was named
    /// explicitly must exist and parse.
    pub fn load(&self) -> Result<TomlConfig> {
        self.load_with_source().map(|(config, _)| config)
    }

    /// [`load`](Self::load), also returning which file was used.
    ///
    /// Does not log; the caller reports the origin once tracing is set up.
    pub fn load_with_source(&self) -> Result<(TomlConfig, Option<(PathBuf, ConfigSource)>)> {
        match self.resolve() {
            Some((path, source)) => {
                let config = load_toml_config(&path)?;
                Ok((config, Some((path, source))))
            }
            None => Ok((TomlConfig::default(), None)),
        }
    }
}

/// Default user config file location (`~/.config/sxkcd/config.toml` on Linux)
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sxkcd").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a config file atomically (temp file + rename)
///
/// On Unix the file is created with mode 0600.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&temp_path, path)?;
    debug!("Config written to {}", path.display());
    Ok(())
}
