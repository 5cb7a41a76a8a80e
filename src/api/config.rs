//! Effective configuration with credentials masked.

use super::{types::ApiError, AppState};
use axum::{extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

/// GET /api/config
pub async fn handle(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.engine.config.masked().map(Json).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize configuration");
        ApiError::internal("configuration could not be serialized")
    })
}
