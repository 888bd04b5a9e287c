//! Configuration loading and validation for reqlog.
//!
//! Loads configuration from `~/.reqlog/config.toml` with environment
//! variable overrides. Structural settings are validated here; key pattern
//! semantics are validated when the exporter is built from them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.reqlog/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which context fields are exported on every log line of a request
    #[serde(default)]
    pub export: ExportConfig,

    /// Log output settings for the `reqlog` binary
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Context export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Key patterns, e.g. `"req.*"`, `"*rpc*"`, `"attrs.request_id:String"`
    #[serde(default = "default_key_patterns")]
    pub key_patterns: Vec<String>,

    /// Prefix prepended to every exported key
    #[serde(default)]
    pub key_prefix: String,
}

fn default_key_patterns() -> Vec<String> {
    vec![
        "req.*".into(),
        "res.status_code".into(),
        "attrs.request_id:String".into(),
    ]
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            key_patterns: default_key_patterns(),
            key_prefix: String::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set: trace, debug, info, warn, error
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format: "pretty" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".into()
}
fn default_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const FORMATS: &[&str] = &["pretty", "json"];

impl AppConfig {
    /// Load configuration from the default path (~/.reqlog/config.toml).
    ///
    /// Environment variables override the file:
    /// - `REQLOG_EXPORT_KEYS`: comma-separated key patterns (replaces the list)
    /// - `REQLOG_KEY_PREFIX`
    /// - `REQLOG_LOG_LEVEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides, reading variables through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(keys) = lookup("REQLOG_EXPORT_KEYS") {
            tracing::warn!("REQLOG_EXPORT_KEYS overrides export.key_patterns");
            self.export.key_patterns = split_patterns(&keys);
        }

        if let Some(prefix) = lookup("REQLOG_KEY_PREFIX") {
            self.export.key_prefix = prefix;
        }

        if let Some(level) = lookup("REQLOG_LOG_LEVEL") {
            self.logging.level = level.to_ascii_lowercase();
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reqlog")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(i) = self
            .export
            .key_patterns
            .iter()
            .position(|p| p.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "export.key_patterns[{i}] is empty"
            )));
        }

        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LEVELS.join(", "),
                self.logging.level
            )));
        }

        if !FORMATS.contains(&self.logging.format.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of {}, got '{}'",
                FORMATS.join(", "),
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Split a comma-separated pattern list, dropping blanks.
pub fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
