/*!
 * Configuration types for Ferry
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FerryError, Result};

/// URL scheme used to reach the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Log verbosity for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Immutable engine configuration, constructed once and passed by reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hostname of the remote store
    pub host: String,

    /// URL scheme (http or https)
    #[serde(default)]
    pub scheme: Scheme,

    /// Path of the record-creation endpoint
    #[serde(default)]
    pub create_url: String,

    /// Path prefix of the add-link endpoint
    #[serde(default)]
    pub addlink_url: String,

    /// Path prefix of the file-upload endpoint
    #[serde(default)]
    pub upload_url: String,

    /// Absolute URL of the version manifest for self-update
    #[serde(default)]
    pub manifest_url: String,

    /// Installation directory the updater maintains (default: the
    /// executable's directory, resolved at runtime)
    #[serde(default)]
    pub install_dir: Option<PathBuf>,

    /// Opaque credential token (sent as X-Auth-Token)
    #[serde(default)]
    pub token: Option<String>,

    /// Username for Basic credentials
    #[serde(default)]
    pub username: Option<String>,

    /// Password for Basic credentials
    #[serde(default)]
    pub password: Option<String>,

    /// Delimiter splitting multi-value metadata fields
    #[serde(default = "default_multi_value_delimiter")]
    pub multi_value_delimiter: String,

    /// Total attempts per network operation
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed backoff between attempts, in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Pacing delay between catalog items, in seconds (0 disables)
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_secs: u64,

    /// Per-request timeout, in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Minimum age of the local manifest before re-checking for updates
    #[serde(default = "default_update_check_interval")]
    pub update_check_interval_secs: u64,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_multi_value_delimiter() -> String {
    "||".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    10
}

fn default_pacing_delay() -> u64 {
    3
}

fn default_http_timeout() -> u64 {
    30
}

fn default_update_check_interval() -> u64 {
    24 * 3600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            scheme: Scheme::default(),
            create_url: String::new(),
            addlink_url: String::new(),
            upload_url: String::new(),
            manifest_url: String::new(),
            install_dir: None,
            token: None,
            username: None,
            password: None,
            multi_value_delimiter: default_multi_value_delimiter(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            pacing_delay_secs: default_pacing_delay(),
            http_timeout_secs: default_http_timeout(),
            update_check_interval_secs: default_update_check_interval(),
            log_level: LogLevel::default(),
            log_file: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FerryError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = toml::from_str(&raw)
            .map_err(|e| FerryError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Base URL of the remote store, e.g. `https://datastore.example.org`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_secs(self.pacing_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn update_check_interval(&self) -> Duration {
        Duration::from_secs(self.update_check_interval_secs)
    }

    /// Validate the fields the upload pipeline depends on
    pub fn validate_for_upload(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(FerryError::Config("host is not set".to_string()));
        }
        if self.upload_url.is_empty() {
            return Err(FerryError::Config("upload_url is not set".to_string()));
        }
        Ok(())
    }

    /// Validate the fields the update pipeline depends on
    pub fn validate_for_update(&self) -> Result<()> {
        if self.manifest_url.is_empty() {
            return Err(FerryError::Config("manifest_url is not set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.multi_value_delimiter, "||");
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay_secs, 10);
        assert_eq!(config.pacing_delay_secs, 3);
        assert_eq!(config.update_check_interval_secs, 86400);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_parse_minimal() {
        let config: EngineConfig = toml::from_str(
            r#"
            host = "datastore.example.org"
            create_url = "/rest/records"
            upload_url = "/rest/upload"
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "datastore.example.org");
        assert_eq!(config.base_url(), "https://datastore.example.org");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let config: EngineConfig = toml::from_str(
            r#"
            host = "localhost:8081"
            scheme = "http"
            token = "sekrit"
            retry_attempts = 5
            retry_delay_secs = 1
            pacing_delay_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url(), "http://localhost:8081");
        assert_eq!(config.token.as_deref(), Some("sekrit"));
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_backoff(), Duration::from_secs(1));
        assert_eq!(config.pacing_delay(), Duration::ZERO);
    }

    #[test]
    fn test_validate_for_upload() {
        let mut config = EngineConfig::default();
        assert!(config.validate_for_upload().is_err());

        config.host = "datastore.example.org".to_string();
        assert!(config.validate_for_upload().is_err());

        config.upload_url = "/rest/upload".to_string();
        assert!(config.validate_for_upload().is_ok());
    }

    #[test]
    fn test_validate_for_update() {
        let mut config = EngineConfig::default();
        assert!(config.validate_for_update().is_err());

        config.manifest_url = "https://downloads.example.org/manifest.properties".to_string();
        assert!(config.validate_for_update().is_ok());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
    }
}
