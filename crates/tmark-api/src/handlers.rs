//! Request handlers.

pub mod fields;
pub mod jobs;
pub mod lists;
pub mod schemas;
pub mod tags;
pub mod videos;

use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Readiness probe: verifies the database answers.
pub async fn ready(
    axum::extract::State(state): axum::extract::State<crate::state::AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(json!({"status": "ready"})))
}
