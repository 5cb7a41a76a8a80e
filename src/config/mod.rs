//! Configuration module for Homeboard
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`HOMEBOARD_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use homeboard::config::HomeboardConfig;
//!
//! let config = HomeboardConfig::default();
//! assert_eq!(config.server.port, 3030);
//!
//! let toml = r#"
//! [[apps]]
//! id = "tv"
//! template = "sonarr"
//! url = "http://sonarr.lan:8989/api/v3/series"
//! "#;
//! let config: HomeboardConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.apps[0].template, "sonarr");
//! ```

pub mod app;
pub mod error;
pub mod logging;
pub mod retry;
pub mod server;
pub mod storage;

pub use app::{AppConfig, MetricSelector};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use retry::RetryConfig;
pub use server::ServerConfig;
pub use storage::{SecretsConfig, StorageBackend, StorageConfig, SweepConfig};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Unified configuration for a Homeboard instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HomeboardConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub sweep: SweepConfig,
    pub retry: RetryConfig,
    /// Per-template timeout budgets in milliseconds, merged over the built-in table
    pub timeouts: HashMap<String, u64>,
    pub secrets: SecretsConfig,
    pub apps: Vec<AppConfig>,
}

impl HomeboardConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("HOMEBOARD_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("HOMEBOARD_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("HOMEBOARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("HOMEBOARD_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(backend) = std::env::var("HOMEBOARD_STORAGE") {
            if let Ok(b) = backend.parse() {
                self.storage.backend = b;
            }
        }
        if let Ok(path) = std::env::var("HOMEBOARD_DATA_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if let Ok(sweep) = std::env::var("HOMEBOARD_SWEEP") {
            self.sweep.enabled = sweep.to_lowercase() == "true";
        }
        if let Ok(require) = std::env::var("HOMEBOARD_REQUIRE_ENCRYPTION") {
            self.secrets.require_encryption = require.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        if self.retry.max_retries == 0 {
            return Err(ConfigError::Validation {
                field: "retry.max_retries".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            return Err(ConfigError::Validation {
                field: "retry.backoff_multiplier".to_string(),
                message: "multiplier must be a finite number >= 1".to_string(),
            });
        }

        self.storage.validate_prefixes()?;

        if self.sweep.enabled && self.sweep.interval_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "sweep.interval_seconds".to_string(),
                message: "interval must be non-zero".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (i, app) in self.apps.iter().enumerate() {
            if app.id.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("apps[{}].id", i),
                    message: "id cannot be empty".to_string(),
                });
            }
            if app.template.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("apps[{}].template", i),
                    message: "template cannot be empty".to_string(),
                });
            }
            if app.url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("apps[{}].url", i),
                    message: "URL cannot be empty".to_string(),
                });
            }
            if app.poll_interval_seconds == 0 {
                return Err(ConfigError::Validation {
                    field: format!("apps[{}].poll_interval_seconds", i),
                    message: "poll interval must be non-zero".to_string(),
                });
            }
            if !seen.insert(app.id.as_str()) {
                return Err(ConfigError::DuplicateApp(app.id.clone()));
            }
        }

        Ok(())
    }

    /// The configuration as JSON with credential-named fields masked,
    /// including each app's headers.
    pub fn masked(&self) -> Result<serde_json::Value, serde_json::Error> {
        let visible = crate::secrets::DEFAULT_VISIBLE_CHARS;
        let mut value = crate::secrets::mask_object(&serde_json::to_value(self)?, visible);
        if let Some(apps) = value.get_mut("apps").and_then(|a| a.as_array_mut()) {
            for app in apps.iter_mut() {
                *app = crate::secrets::mask_object(app, visible);
            }
        }
        Ok(value)
    }

    /// Look up a configured app by id.
    pub fn app(&self, id: &str) -> Result<&AppConfig, ConfigError> {
        self.apps
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| ConfigError::UnknownApp(id.to_string()))
    }
}
