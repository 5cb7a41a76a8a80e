//! Retry configuration

use crate::retry::RetryOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy applied to every outbound statistics request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical request
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = RetryOptions::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_multiplier: defaults.backoff_multiplier,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            retryable_status_codes: defaults.retryable_status_codes.iter().copied().collect(),
        }
    }
}

impl RetryConfig {
    pub fn to_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
            retryable_status_codes: self.retryable_status_codes.iter().copied().collect(),
            ..RetryOptions::default()
        }
    }
}
