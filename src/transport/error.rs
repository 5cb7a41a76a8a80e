//! Transport-level failures of a single request attempt.

use thiserror::Error;

/// A request attempt that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Deadline elapsed before the response completed
    #[error("request timeout after {0}ms")]
    Timeout(u64),

    /// Request was cancelled before completion
    #[error("request aborted")]
    Aborted,

    /// Connection could not be established or was dropped
    #[error("network error: {0}")]
    Network(String),

    /// Anything else the transport reported
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Map a reqwest error onto the attempt-failure taxonomy.
    pub fn from_reqwest(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(timeout_ms)
        } else if e.is_connect() || e.is_request() {
            FetchError::Network(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}
