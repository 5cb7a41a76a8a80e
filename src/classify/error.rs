//! Structured, user-facing fetch errors.

use super::{classify, explain, ErrorKind};
use crate::transport::{FetchError, StatResponse};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// A failure ready to be shown to a user: what happened and what to do.
///
/// Built once, where a failure leaves the fetch pipeline; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct StructuredError {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Set when the request was never sent because the app's own settings
    /// are unusable.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub misconfigured: bool,
    #[source]
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_cause"
    )]
    pub cause: Option<FetchError>,
}

fn serialize_cause<S: Serializer>(cause: &Option<FetchError>, s: S) -> Result<S::Ok, S::Error> {
    match cause {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_none(),
    }
}

impl StructuredError {
    /// Classify and explain a failed request in one step.
    pub fn from_failure(error: Option<&FetchError>, response: Option<&StatResponse>) -> Self {
        let kind = classify(error, response);
        let explanation = explain(kind, error, response);
        Self {
            kind,
            message: explanation.message,
            hint: explanation.hint,
            status_code: response.map(|r| r.status),
            misconfigured: false,
            cause: error.cloned(),
        }
    }

    /// A 2xx response whose body could not be interpreted.
    pub fn malformed(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            kind: ErrorKind::Unknown,
            message: "The service returned a response that could not be read".to_string(),
            hint: "Check that the URL points at the integration's API endpoint, not its web UI."
                .to_string(),
            status_code: Some(status),
            misconfigured: false,
            cause: Some(FetchError::Other(detail)),
        }
    }

    /// The app's own configuration prevents the request from being built.
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: format!("The app is misconfigured: {}", detail.into()),
            hint: "Check this app's settings. Encrypted values must be produced with the current encryption key."
                .to_string(),
            status_code: None,
            misconfigured: true,
            cause: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_failure_timeout() {
        let err = StructuredError::from_failure(Some(&FetchError::Timeout(15_000)), None);
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.status_code.is_none());
        assert_eq!(err.cause, Some(FetchError::Timeout(15_000)));
    }

    #[test]
    fn test_from_failure_response_keeps_status() {
        let err = StructuredError::from_failure(None, Some(&StatResponse::new(401, "nope")));
        assert_eq!(err.kind, ErrorKind::Client);
        assert_eq!(err.status_code, Some(401));
        assert!(err.hint.contains("API key"));
        assert_eq!(err.to_string(), err.message);
    }

    #[test]
    fn test_serialization_renders_cause_as_text() {
        let err = StructuredError::from_failure(
            Some(&FetchError::Network("connection refused".to_string())),
            None,
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "network");
        assert_eq!(json["cause"], "network error: connection refused");
        assert!(json.get("status_code").is_none());
    }

    #[test]
    fn test_only_configuration_errors_are_marked() {
        let config = StructuredError::configuration("bad key");
        assert!(config.misconfigured);
        assert_eq!(serde_json::to_value(&config).unwrap()["misconfigured"], true);

        let other = StructuredError::from_failure(Some(&FetchError::Other("body".into())), None);
        assert!(!other.misconfigured);
        assert!(serde_json::to_value(&other).unwrap().get("misconfigured").is_none());
    }

    #[test]
    fn test_malformed_is_unknown() {
        let err = StructuredError::malformed(200, "expected value at line 1 column 1");
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.status_code, Some(200));
    }
}
