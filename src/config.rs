//! File-based configuration
//!
//! Loaded from `config.toml` in the platform config directory. Every field
//! has a default, so a missing or partial file is fine.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::data::open_meteo::OPEN_METEO_BASE_URL;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where cached snapshots are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    #[default]
    Disk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between automatic refreshes
    pub refresh_interval_secs: u64,

    /// Seconds a cached snapshot stays fresh
    pub cache_ttl_secs: u64,

    /// Upper bound on a single upstream request
    pub request_timeout_secs: u64,

    /// Forecast endpoint
    pub forecast_url: String,

    pub cache_backend: CacheBackendKind,

    /// Overrides the platform cache directory for the disk backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            cache_ttl_secs: 60,
            request_timeout_secs: 10,
            forecast_url: OPEN_METEO_BASE_URL.to_string(),
            cache_backend: CacheBackendKind::Disk,
            cache_dir: None,
        }
    }
}

impl Config {
    /// Platform config file location, if a home directory can be determined
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "skywatch").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads from the default location, falling back to defaults if the file is absent
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads and validates a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !(self.forecast_url.starts_with("http://") || self.forecast_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "forecast_url must be an http(s) URL, got '{}'",
                self.forecast_url
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_backend, CacheBackendKind::Disk);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cache_ttl_secs = 120\ncache_backend = \"memory\"\n");

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.cache_ttl_secs, 120);
        assert_eq!(config.cache_backend, CacheBackendKind::Memory);
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.forecast_url, OPEN_METEO_BASE_URL);
    }

    #[test]
    fn test_cache_dir_is_read() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cache_dir = \"/tmp/skywatch-cache\"\n");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/skywatch-cache")));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cache_ttl_secs = \"soon\"");

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "refresh_interval_secs = 0");

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("refresh_interval_secs"));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let config = Config {
            forecast_url: "ftp://example.com".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
