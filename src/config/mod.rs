//! YAML configuration loading.
//!
//! Every section and field has a default, so a missing file or an empty
//! document yields a fully usable configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::executor::HttpExecutorConfig;
use crate::scheduler::SchedulerOptions;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub http_job: HttpJobConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// HTTP server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// In-memory storage (default, non-persistent).
    #[serde(rename = "memory")]
    #[default]
    Memory,
    /// SQLite storage.
    #[serde(rename = "sqlite")]
    Sqlite {
        /// Path to the database file.
        path: String,
    },
}

/// Scheduler loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the loop checks for due triggers, in seconds.
    pub tick_interval_secs: u64,
    /// How long shutdown waits for in-flight jobs, in seconds.
    pub shutdown_grace_secs: u64,
    /// Whether a job may fire while a previous firing is still running.
    pub allow_overlap: bool,
    /// IANA timezone cron fields are evaluated in.
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 1,
            shutdown_grace_secs: 30,
            allow_overlap: true,
            timezone: "UTC".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            tick_interval: Duration::from_secs(self.tick_interval_secs.max(1)),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            allow_overlap: self.allow_overlap,
            timezone: self.timezone.clone(),
        }
    }
}

/// HTTP executor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpJobConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// When true, a 4xx/5xx response is recorded as a failure.
    pub fail_on_http_error: bool,
}

impl Default for HttpJobConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            fail_on_http_error: false,
        }
    }
}

impl HttpJobConfig {
    pub fn executor_config(&self) -> HttpExecutorConfig {
        HttpExecutorConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            fail_on_http_error: self.fail_on_http_error,
        }
    }
}

/// Execution history retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Days of history to keep; zero or negative disables cleanup.
    pub retention_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { retention_days: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.scheduler.tick_interval_secs, 1);
        assert!(config.scheduler.allow_overlap);
        assert_eq!(config.scheduler.timezone, "UTC");
        assert_eq!(config.http_job.connect_timeout_secs, 10);
        assert!(!config.http_job.fail_on_http_error);
        assert_eq!(config.history.retention_days, 10);
    }

    #[test]
    fn test_partial_document_overrides_only_named_fields() {
        let yaml = r#"
server:
  port: 9090
storage:
  type: sqlite
  path: /var/lib/chime/chime.db
scheduler:
  allow_overlap: false
  timezone: Europe/Rome
history:
  retention_days: 30
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(matches!(
            config.storage,
            StorageConfig::Sqlite { ref path } if path == "/var/lib/chime/chime.db"
        ));
        assert!(!config.scheduler.allow_overlap);
        assert_eq!(config.scheduler.timezone, "Europe/Rome");
        assert_eq!(config.scheduler.tick_interval_secs, 1);
        assert_eq!(config.history.retention_days, 30);
    }

    #[test]
    fn test_scheduler_options_conversion() {
        let mut config = SchedulerConfig::default();
        config.tick_interval_secs = 0;
        let options = config.options();
        // Tick interval is clamped to at least one second.
        assert_eq!(options.tick_interval, Duration::from_secs(1));
        assert_eq!(options.shutdown_grace, Duration::from_secs(30));
    }

    #[test]
    fn test_executor_config_conversion() {
        let config = HttpJobConfig {
            connect_timeout_secs: 5,
            request_timeout_secs: 15,
            fail_on_http_error: true,
        };
        let exec = config.executor_config();
        assert_eq!(exec.connect_timeout, Duration::from_secs(5));
        assert_eq!(exec.request_timeout, Duration::from_secs(15));
        assert!(exec.fail_on_http_error);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("server: [not, a, map]");
        assert!(result.is_err());
    }
}
