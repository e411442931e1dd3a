//! Download settings resolved from the bootstrap TOML
//!
//! `TomlConfig` carries raw numbers; `DownloadSettings` is the validated
//! runtime view handed to the client and the batch coordinator.

use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;
use sxkcd_common::config::TomlConfig;
use sxkcd_common::{Error, Result};

/// Validated runtime settings for the downloader
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub xkcd_base_url: String,
    pub explain_base_url: String,
    /// Overall timeout of one HTTP request, independent of retries
    pub http_timeout: Duration,
    pub max_body_bytes: u64,
    pub retry: RetryPolicy,
    pub concurrency: usize,
    pub output_file: PathBuf,
    pub watch_interval: Duration,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default()).expect("built-in defaults are valid")
    }
}

impl DownloadSettings {
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if config.retry_attempts == 0 {
            return Err(Error::Config("retry_attempts must be at least 1".to_string()));
        }
        if config.http_timeout_secs == 0 {
            return Err(Error::Config("http_timeout_secs must be at least 1".to_string()));
        }
        if config.max_body_bytes == 0 {
            return Err(Error::Config("max_body_bytes must be at least 1".to_string()));
        }
        if config.watch_interval_secs == 0 {
            return Err(Error::Config("watch_interval_secs must be at least 1".to_string()));
        }

        Ok(Self {
            xkcd_base_url: config.xkcd_base_url.clone(),
            explain_base_url: config.explain_base_url.clone(),
            http_timeout: Duration::from_secs(config.http_timeout_secs),
            max_body_bytes: config.max_body_bytes,
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            concurrency: config.concurrency,
            output_file: config.output_file.clone(),
            watch_interval: Duration::from_secs(config.watch_interval_secs),
        })
    }
}
