//! # Read-only HTTP API
//!
//! Exposes cached card statistics, derived connection status and trends to
//! dashboard front-ends. Handlers only read the cache, except `refresh`,
//! which fetches through the same pipeline as the poller.
//!
//! ## Endpoints
//!
//! - `GET /health` - Process health with app counts by status
//! - `GET /api/apps` - Every configured app with its status
//! - `GET /api/apps/:app_id/status` - Status of one app
//! - `GET /api/apps/:app_id/stats` - Fresh cached payload
//! - `GET /api/apps/:app_id/trends/:key?days=N` - Daily averages
//! - `POST /api/apps/:app_id/refresh` - Fetch now
//! - `GET /api/config` - Effective configuration, credentials masked
//! - `GET /metrics` - Prometheus text format
//!
//! ## Error Handling
//!
//! ```json
//! {
//!   "error": {
//!     "kind": "client",
//!     "message": "Authentication failed (HTTP 401)",
//!     "hint": "Check the API key or token configured for this app.",
//!     "status_code": 401
//!   }
//! }
//! ```

mod apps;
mod config;
mod health;
pub mod types;

pub use types::*;

use crate::engine::Engine;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// No endpoint accepts a body.
const MAX_BODY_SIZE: usize = 16 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub engine: Arc<Engine>,
    pub start_time: Instant,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
            prometheus: crate::telemetry::metrics_handle(),
        }
    }
}

/// Create the API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let request_timeout = state.engine.request_timeout();

    Router::new()
        .route("/health", get(health::handle))
        .route("/metrics", get(metrics_handler))
        .route("/api/apps", get(apps::list))
        .route("/api/apps/:app_id/status", get(apps::status))
        .route("/api/apps/:app_id/stats", get(apps::stats))
        .route("/api/apps/:app_id/trends/:key", get(apps::trends))
        .route("/api/apps/:app_id/refresh", post(apps::refresh))
        .route("/api/config", get(config::handle))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /metrics - Prometheus exposition format, 200 even when empty.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    health::update_status_gauges(&state);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
