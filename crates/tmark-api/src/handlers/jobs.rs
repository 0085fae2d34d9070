//! Ingestion job handlers: progress history replay over HTTP.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tmark_models::{ProgressEvent, ServerFrame};
use tmark_store::jobs;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    /// Milliseconds since epoch; only events strictly newer are returned.
    #[serde(default)]
    pub since: i64,
}

#[derive(Debug, Serialize)]
pub struct ProgressReplayResponse {
    pub job_id: Uuid,
    /// Same frame shape the WebSocket delivers, RFC 3339 timestamps.
    pub events: Vec<ServerFrame>,
}

/// Replay progress history for a job's videos.
///
/// At-least-once: the ring may return events the client already saw; dedupe
/// by `(video_id, timestamp)`.
pub async fn replay_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<Json<ProgressReplayResponse>> {
    let job = jobs::get(&state.pool, &user.user_id, job_id).await?;
    let video_ids = jobs::video_ids(&state.pool, job.id).await?;

    let mut events: Vec<ProgressEvent> = Vec::new();
    for video_id in video_ids {
        events.extend(state.progress.history_since(video_id, query.since).await?);
    }
    events.sort_by_key(|e| e.timestamp_ms);

    Ok(Json(ProgressReplayResponse {
        job_id: job.id,
        events: events.iter().map(ServerFrame::from).collect(),
    }))
}
