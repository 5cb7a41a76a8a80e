//! Failure classification for integration requests.
//!
//! Every failed statistics fetch is reduced to one of five [`ErrorKind`]s,
//! which decide both retry behaviour and what the user is told. Classification
//! and explanation are pure functions; they never panic.

mod error;

pub use error::StructuredError;

use crate::transport::{FetchError, StatResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message fragments that identify a low-level connectivity failure.
const NETWORK_MARKERS: &[&str] = &[
    "fetch failed",
    "network",
    "connection",
    "dns",
    "econnrefused",
    "econnreset",
    "unreachable",
];

/// Category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// No connectivity to the remote host
    Network,
    /// Deadline exceeded
    Timeout,
    /// Remote 5xx
    Server,
    /// Remote 4xx, never retried
    Client,
    /// Anything else, including malformed responses
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Whether waiting and trying again can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Server
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// What happened
    pub message: String,
    /// What to do about it
    pub hint: String,
}

/// Assign an [`ErrorKind`] to a failed attempt. First match wins:
/// timeout/abort, network failure, HTTP status, unknown.
pub fn classify(error: Option<&FetchError>, response: Option<&StatResponse>) -> ErrorKind {
    if let Some(error) = error {
        match error {
            FetchError::Timeout(_) | FetchError::Aborted => return ErrorKind::Timeout,
            FetchError::Network(_) => return ErrorKind::Network,
            FetchError::Other(message) if is_network_message(message) => {
                return ErrorKind::Network
            }
            FetchError::Other(_) => {}
        }
    }

    match response.map(|r| r.status) {
        Some(status) if status >= 500 => ErrorKind::Server,
        Some(status) if (400..=499).contains(&status) => ErrorKind::Client,
        _ => ErrorKind::Unknown,
    }
}

fn is_network_message(message: &str) -> bool {
    let message = message.to_lowercase();
    NETWORK_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Produce the message and remediation hint for a failure of `kind`.
pub fn explain(
    kind: ErrorKind,
    error: Option<&FetchError>,
    response: Option<&StatResponse>,
) -> Explanation {
    let status = response.map(|r| r.status);

    let (message, hint) = match kind {
        ErrorKind::Network => (
            "Unable to reach the service".to_string(),
            "Check that the service is running and that its URL and port are reachable from the dashboard host.",
        ),
        ErrorKind::Timeout => (
            "The service took too long to respond".to_string(),
            "The service may be busy. Try again later or raise the timeout configured for this app.",
        ),
        ErrorKind::Server => (
            match status {
                Some(code) => format!("The service reported an internal error (HTTP {})", code),
                None => "The service reported an internal error".to_string(),
            },
            "The problem is on the service side. Check the service's own logs.",
        ),
        ErrorKind::Client => match status {
            Some(code @ (401 | 403)) => (
                format!("Authentication failed (HTTP {})", code),
                "Check the API key or token configured for this app.",
            ),
            Some(404) => (
                "Endpoint not found (HTTP 404)".to_string(),
                "Check the URL configured for this app, including any base path.",
            ),
            Some(code) => (
                format!("The service rejected the request (HTTP {})", code),
                "Check this app's configuration.",
            ),
            None => (
                "The service rejected the request".to_string(),
                "Check this app's configuration.",
            ),
        },
        ErrorKind::Unknown => (
            match error {
                Some(e) => format!("An unexpected error occurred: {}", e),
                None => "An unexpected error occurred".to_string(),
            },
            "Try again. If the problem persists, check the homeboard logs.",
        ),
    };

    Explanation {
        message,
        hint: hint.to_string(),
    }
}
