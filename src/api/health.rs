//! Health check endpoint handler.

use super::AppState;
use crate::status::ConnectionStatus;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub apps: AppCounts,
    pub storage_available: bool,
    pub encryption_enabled: bool,
}

/// App counts by connection status.
#[derive(Debug, Default, Serialize)]
pub struct AppCounts {
    pub total: usize,
    pub online: usize,
    pub pending: usize,
    pub offline: usize,
    pub unknown: usize,
}

impl AppCounts {
    fn add(&mut self, status: ConnectionStatus) {
        self.total += 1;
        match status {
            ConnectionStatus::Online => self.online += 1,
            ConnectionStatus::Pending => self.pending += 1,
            ConnectionStatus::Offline => self.offline += 1,
            ConnectionStatus::Unknown => self.unknown += 1,
        }
    }
}

pub(super) fn count_apps(state: &AppState) -> AppCounts {
    let poller = &state.engine.poller;
    let mut counts = AppCounts::default();
    for app in poller.apps() {
        counts.add(poller.status(app).status);
    }
    counts
}

pub(super) fn update_status_gauges(state: &AppState) {
    let counts = count_apps(state);
    for (status, count) in [
        (ConnectionStatus::Online, counts.online),
        (ConnectionStatus::Pending, counts.pending),
        (ConnectionStatus::Offline, counts.offline),
        (ConnectionStatus::Unknown, counts.unknown),
    ] {
        metrics::gauge!("homeboard_apps", "status" => status.as_str()).set(count as f64);
    }
}

/// GET /health - the process is up; app counts describe the integrations.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let apps = count_apps(&state);
    let status = if apps.offline > 0 { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        apps,
        storage_available: state.engine.store.is_available(),
        encryption_enabled: state.engine.cipher.is_enabled(),
    })
}
