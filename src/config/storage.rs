//! Storage, sweep and secrets configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Which key-value store backs the cache and metrics history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON file on disk, survives restarts
    #[default]
    File,
    /// Process memory only
    Memory,
    /// No storage; every read misses
    Disabled,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "memory" => Ok(StorageBackend::Memory),
            "disabled" | "none" => Ok(StorageBackend::Disabled),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
    pub cache_prefix: String,
    pub metrics_prefix: String,
    /// How often a running server writes buffered changes to the store file
    pub flush_interval_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("data/homeboard-store.json"),
            cache_prefix: crate::cache::DEFAULT_CACHE_PREFIX.to_string(),
            metrics_prefix: crate::trends::DEFAULT_METRICS_PREFIX.to_string(),
            flush_interval_seconds: 5,
        }
    }
}

impl StorageConfig {
    /// Both prefixes must be non-empty and neither may start the other.
    /// Pruning the cache walks every key under its prefix.
    pub fn validate_prefixes(&self) -> Result<(), ConfigError> {
        let cache = self.cache_prefix.as_str();
        let metrics = self.metrics_prefix.as_str();
        for (field, prefix) in [
            ("storage.cache_prefix", cache),
            ("storage.metrics_prefix", metrics),
        ] {
            if prefix.is_empty() {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: "prefix cannot be empty".to_string(),
                });
            }
        }
        if cache.starts_with(metrics) || metrics.starts_with(cache) {
            return Err(ConfigError::Validation {
                field: "storage.cache_prefix".to_string(),
                message: format!(
                    "'{}' overlaps storage.metrics_prefix '{}'",
                    cache, metrics
                ),
            });
        }
        Ok(())
    }
}

/// Background pruning of stale cache entries and old metric samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub retention_days: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 24 * 60 * 60,
            retention_days: crate::trends::RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Refuse to start when no encryption key is configured
    pub require_encryption: bool,
}
