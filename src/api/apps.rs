//! Per-app endpoints.

use super::types::{
    ApiError, AppSummary, RefreshResponse, StatsResponse, TrendsQuery, TrendsResponse,
};
use super::AppState;
use crate::config::AppConfig;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

const DEFAULT_TREND_DAYS: u32 = 7;

fn find_app<'a>(state: &'a AppState, app_id: &str) -> Result<&'a AppConfig, ApiError> {
    state
        .engine
        .poller
        .app(app_id)
        .ok_or_else(|| ApiError::app_not_found(app_id))
}

pub(super) fn summarize(state: &AppState, app: &AppConfig) -> AppSummary {
    let poller = &state.engine.poller;
    AppSummary::new(app, poller.status(app), poller.last_error(&app.id))
}

/// GET /api/apps
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<AppSummary>> {
    let summaries = state
        .engine
        .poller
        .apps()
        .iter()
        .map(|app| summarize(&state, app))
        .collect();
    Json(summaries)
}

/// GET /api/apps/:app_id/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(app_id): Path<String>,
) -> Result<Json<AppSummary>, ApiError> {
    let app = find_app(&state, &app_id)?;
    Ok(Json(summarize(&state, app)))
}

/// GET /api/apps/:app_id/stats - fresh cached payload only.
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(app_id): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let app = find_app(&state, &app_id)?;
    let cache = &state.engine.cache;
    let key = cache.build_key(&app.id, &app.template, None);

    let entry = cache
        .entry(&key)
        .filter(|entry| entry.is_fresh(cache.now_ms()))
        .ok_or_else(|| ApiError::no_fresh_stats(&app.id))?;

    Ok(Json(StatsResponse {
        app_id: app.id.clone(),
        template: app.template.clone(),
        value: entry.value,
        fetched_at: entry.timestamp,
    }))
}

/// GET /api/apps/:app_id/trends/:key?days=N
pub async fn trends(
    State(state): State<Arc<AppState>>,
    Path((app_id, key)): Path<(String, String)>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<TrendsResponse>, ApiError> {
    let app = find_app(&state, &app_id)?;
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    if days == 0 {
        return Err(ApiError::bad_request("days must be at least 1"));
    }

    let trends = &state.engine.trends;
    let samples = trends.query(&app.id, &app.template, &key, days).len();
    let daily = trends.daily_average(&app.id, &app.template, &key, days);

    Ok(Json(TrendsResponse {
        app_id: app.id.clone(),
        template: app.template.clone(),
        key,
        days,
        samples,
        daily,
    }))
}

/// POST /api/apps/:app_id/refresh - fetch now through the retry pipeline.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(app_id): Path<String>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let app = find_app(&state, &app_id)?;
    tracing::info!(app = %app.id, "Manual refresh requested");

    let value = state.engine.poller.poll_app(app).await?;
    Ok(Json(RefreshResponse {
        app_id: app.id.clone(),
        value,
    }))
}
