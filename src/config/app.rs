//! Card (application) configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configured dashboard card whose statistics are polled from an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Stable identifier, used in cache and metric keys
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Integration template id (e.g. "sonarr", "plex")
    pub template: String,
    /// Full URL of the statistics endpoint
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers. Credential headers may hold `encrypted:` values.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Explicit request timeout; wins over the template's latency budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Numeric values extracted from each response and recorded as trends
    #[serde(default)]
    pub metrics: Vec<MetricSelector>,
}

/// Selects one numeric value out of an integration response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSelector {
    pub key: String,
    /// JSON pointer into the response body (e.g. "/records/0/count")
    pub pointer: String,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_cache_ttl() -> u64 {
    300
}

impl AppConfig {
    /// Minimal card with defaults for everything but identity and endpoint.
    pub fn new(id: impl Into<String>, template: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            template: template.into(),
            url: url.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            timeout_ms: None,
            poll_interval_seconds: default_poll_interval(),
            cache_ttl_seconds: default_cache_ttl(),
            metrics: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}
