use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::retry::RetryPolicy;
use crate::lifecycle::ExportSettings;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Global gxyarchiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Galaxy API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key sent as `X-API-KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bundle size budget in GB
    #[serde(default = "default_tar_size_gb")]
    pub default_tar_size_gb: f64,

    /// Seconds between export task status checks
    #[serde(default = "default_task_check_interval")]
    pub task_check_interval_secs: u64,

    /// Seconds to wait after creating an export before the first status check
    #[serde(default = "default_request_delay")]
    pub request_delay_secs: u64,

    /// File source name the exports are written to
    #[serde(default = "default_filesource_destination")]
    pub filesource_destination: String,

    /// Export format requested from the remote
    #[serde(default = "default_model_store_format")]
    pub model_store_format: String,

    #[serde(default = "default_true")]
    pub include_files: bool,

    #[serde(default = "default_true")]
    pub include_deleted: bool,

    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Glob, relative to the export directory, selecting export files
    #[serde(default = "default_export_file_pattern")]
    pub export_file_pattern: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_api_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_tar_size_gb() -> f64 {
    300.0
}
fn default_task_check_interval() -> u64 {
    5
}
fn default_request_delay() -> u64 {
    1
}
fn default_filesource_destination() -> String {
    "gxy-archiver".to_string()
}
fn default_model_store_format() -> String {
    "rocrate.zip".to_string()
}
fn default_true() -> bool {
    true
}
fn default_export_file_pattern() -> String {
    "**/*.rocrate.zip".to_string()
}
fn default_http_timeout() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            default_tar_size_gb: default_tar_size_gb(),
            task_check_interval_secs: default_task_check_interval(),
            request_delay_secs: default_request_delay(),
            filesource_destination: default_filesource_destination(),
            model_store_format: default_model_store_format(),
            include_files: true,
            include_deleted: true,
            include_hidden: true,
            export_file_pattern: default_export_file_pattern(),
            http_timeout_secs: default_http_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Get the gxyarchiver data directory (~/.gxyarchiver)
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".gxyarchiver")
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Load config from `path` (or the default location); defaults if absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to `path` (or the default location)
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(path)
    }

    /// Target URI namespace for exports, e.g. `gxfiles://gxy-archiver`
    pub fn export_namespace(&self) -> String {
        format!("gxfiles://{}", self.filesource_destination)
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            namespace: self.export_namespace(),
            model_store_format: self.model_store_format.clone(),
            include_files: self.include_files,
            include_deleted: self.include_deleted,
            include_hidden: self.include_hidden,
            poll_interval: Duration::from_secs(self.task_check_interval_secs),
            request_delay: Duration::from_secs(self.request_delay_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Convert a size in GB (as given on the command line) to bytes
pub fn gb_to_bytes(gb: f64) -> u64 {
    if gb <= 0.0 || !gb.is_finite() {
        return 0;
    }
    (gb * BYTES_PER_GB) as u64
}
