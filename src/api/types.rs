//! Request and response bodies of the HTTP API.

use crate::classify::{ErrorKind, StructuredError};
use crate::config::AppConfig;
use crate::status::{ConnectionStatus, StatusReport};
use crate::trends::DailyAverage;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One card as seen by a dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    pub template: String,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ApiErrorBody>,
}

impl AppSummary {
    pub fn new(app: &AppConfig, report: StatusReport, last_error: Option<StructuredError>) -> Self {
        Self {
            id: app.id.clone(),
            name: app.display_name().to_string(),
            template: app.template.clone(),
            status: report.status,
            last_seen: report.last_seen,
            age_ms: report.age_ms,
            last_error: last_error.map(ApiErrorBody::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub app_id: String,
    pub template: String,
    pub value: Value,
    /// Epoch milliseconds of the cache write
    pub fetched_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsResponse {
    pub app_id: String,
    pub template: String,
    pub key: String,
    pub days: u32,
    pub samples: usize,
    pub daily: Vec<DailyAverage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub app_id: String,
    pub value: Value,
}

/// Error envelope: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub http_status: u16,
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub kind: String,
    pub message: String,
    pub hint: String,
    /// Status returned by the integration, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl From<StructuredError> for ApiErrorBody {
    fn from(error: StructuredError) -> Self {
        Self {
            kind: error.kind.as_str().to_string(),
            message: error.message,
            hint: error.hint,
            status_code: error.status_code,
        }
    }
}

impl ApiError {
    fn new(http_status: StatusCode, kind: &str, message: String, hint: &str) -> Self {
        Self {
            http_status: http_status.as_u16(),
            error: ApiErrorBody {
                kind: kind.to_string(),
                message,
                hint: hint.to_string(),
                status_code: None,
            },
        }
    }

    /// Create an unknown app error (404).
    pub fn app_not_found(app_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("App '{}' is not configured", app_id),
            "Check the app id against GET /api/apps.",
        )
    }

    /// Create a cache miss error (404).
    pub fn no_fresh_stats(app_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No fresh stats cached for app '{}'", app_id),
            "Wait for the next poll or POST to this app's refresh endpoint.",
        )
    }

    /// Create a bad request error (400).
    pub fn bad_request(message: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            message.to_string(),
            "Check the request parameters.",
        )
    }

    /// Create an internal error (500).
    pub fn internal(message: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            message.to_string(),
            "Check the homeboard logs.",
        )
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// A failed integration fetch, reported the way a gateway would.
impl From<StructuredError> for ApiError {
    fn from(error: StructuredError) -> Self {
        let http_status = match error.kind {
            _ if error.misconfigured => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Network | ErrorKind::Server | ErrorKind::Client | ErrorKind::Unknown => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self {
            http_status: http_status.as_u16(),
            error: error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
