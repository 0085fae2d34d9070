//! Video handlers: bulk ingestion, list/detail views, watch progress,
//! typed field values, delete, and manual retry.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use tmark_ingest::ParseOutcome;
use tmark_models::{
    earliest_failed_stage, CustomField, Enrichment, ProcessingStatus, ResolvedField, Tag, Video,
};
use tmark_queue::EnrichJob;
use tmark_store::retry::with_tx_retry;
use tmark_store::values::{ValueUpdate, ValueWithField};
use tmark_store::{enrichments, jobs, lists, resolver, tags, values, videos};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// A filled field value as returned by list and detail views.
#[derive(Debug, Serialize)]
pub struct FieldValueOut {
    pub field_id: Uuid,
    pub name: String,
    pub field_type: &'static str,
    pub value: Value,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&ValueWithField> for FieldValueOut {
    fn from(v: &ValueWithField) -> Self {
        Self {
            field_id: v.field.id,
            name: v.field.name.clone(),
            field_type: v.field.field_type().as_str(),
            value: v.value.to_json(),
            updated_at: v.updated_at,
        }
    }
}

/// An entry of the resolved field union.
#[derive(Debug, Serialize)]
pub struct AvailableFieldOut {
    #[serde(flatten)]
    pub field: CustomField,
    pub effective_display_name: String,
    pub show_on_card: bool,
}

impl From<ResolvedField> for AvailableFieldOut {
    fn from(r: ResolvedField) -> Self {
        Self {
            field: r.field,
            effective_display_name: r.effective_display_name,
            show_on_card: r.show_on_card,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoSummaryOut {
    #[serde(flatten)]
    pub video: Video,
    pub field_values: Vec<FieldValueOut>,
}

#[derive(Debug, Serialize)]
pub struct VideoDetailOut {
    #[serde(flatten)]
    pub video: Video,
    pub enrichment: Option<Enrichment>,
    pub tags: Vec<Tag>,
    pub field_values: Vec<FieldValueOut>,
    pub available_fields: Vec<AvailableFieldOut>,
}

// ============================================================================
// Bulk ingestion
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BulkIngestRequest {
    /// Direct URL list (pasted input is pre-split by the client)
    #[serde(default)]
    pub urls: Vec<String>,
    /// Raw pasted text, split server-side
    #[serde(default)]
    pub text: Option<String>,
    /// CSV export with a `url` column
    #[serde(default)]
    pub csv: Option<String>,
    /// An Apple `.webloc` document
    #[serde(default)]
    pub webloc: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkIngestResponse {
    pub job_id: Uuid,
    pub accepted: i32,
    pub rejected_count: i32,
}

/// Submit a bulk ingestion job. Rejected URLs never fail the request; they
/// are reported per-row through `rejected_count`.
pub async fn bulk_ingest(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
    Json(body): Json<BulkIngestRequest>,
) -> ApiResult<(StatusCode, Json<BulkIngestResponse>)> {
    lists::get(&state.pool, &user.user_id, list_id)
        .await
        .map_err(|e| match e {
            tmark_store::StoreError::NotFound { .. } => {
                ApiError::BadRequest("invalid list".to_string())
            }
            other => other.into(),
        })?;

    let mut outcome = ParseOutcome::default();
    for url in &body.urls {
        let url = url.trim();
        if !url.is_empty() {
            outcome.push_candidate(url);
        }
    }
    if let Some(text) = &body.text {
        outcome.merge(tmark_ingest::parse_text(text));
    }
    if let Some(csv) = &body.csv {
        outcome.merge(tmark_ingest::parse_csv(csv));
    }
    if let Some(webloc) = &body.webloc {
        outcome.merge(tmark_ingest::parse_webloc(webloc));
    }

    let ids: Vec<_> = outcome.entries.iter().map(|e| e.id.clone()).collect();
    let bulk = jobs::create_bulk(
        &state.pool,
        list_id,
        &user.user_id,
        &ids,
        outcome.rejected,
    )
    .await?;

    for queued in &bulk.queued {
        let job = EnrichJob {
            job_id: bulk.job.id,
            video_job_id: queued.video_job_id,
            video_id: queued.video_id,
            list_id,
            user_id: user.user_id.clone(),
            youtube_id: queued.youtube_id.clone(),
        };
        match state.queue.enqueue(&job).await {
            Ok(_) => {}
            // A run for this video is already outstanding; fine.
            Err(e) if e.is_duplicate() => {}
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        job_id = %bulk.job.id,
        accepted = bulk.job.accepted,
        rejected = bulk.job.rejected,
        "Bulk ingestion submitted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(BulkIngestResponse {
            job_id: bulk.job.id,
            accepted: bulk.job.accepted,
            rejected_count: bulk.job.rejected,
        }),
    ))
}

// ============================================================================
// Views
// ============================================================================

/// List a list's videos with their filled field values.
pub async fn list_videos(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<VideoSummaryOut>>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;

    let videos = videos::list_for_list(&state.pool, list_id).await?;
    let mut values_by_video = values::for_list(&state.pool, list_id).await?;

    let out = videos
        .into_iter()
        .map(|video| {
            let field_values = values_by_video
                .remove(&video.id)
                .unwrap_or_default()
                .iter()
                .map(FieldValueOut::from)
                .collect();
            VideoSummaryOut {
                video,
                field_values,
            }
        })
        .collect();

    Ok(Json(out))
}

/// Video detail: enrichment, tags, filled values, and the resolved field
/// union for display and editing.
pub async fn get_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<Json<VideoDetailOut>> {
    let video = videos::get_for_user(&state.pool, &user.user_id, video_id).await?;
    let enrichment = enrichments::get(&state.pool, video_id).await.ok();
    let video_tags = tags::for_video(&state.pool, video_id).await?;
    let field_values = values::for_video(&state.pool, video_id).await?;
    let available = resolver::available_fields(&state.pool, video_id).await?;

    Ok(Json(VideoDetailOut {
        video,
        enrichment,
        tags: video_tags,
        field_values: field_values.iter().map(FieldValueOut::from).collect(),
        available_fields: available.into_iter().map(AvailableFieldOut::from).collect(),
    }))
}

// ============================================================================
// Watch progress
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WatchProgressRequest {
    pub watch_position: Option<i32>,
}

/// Update the player resume position.
pub async fn update_watch_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
    Json(body): Json<WatchProgressRequest>,
) -> ApiResult<StatusCode> {
    if matches!(body.watch_position, Some(p) if p < 0) {
        return Err(ApiError::validation("watch_position must be non-negative"));
    }
    videos::set_watch_position(&state.pool, &user.user_id, video_id, body.watch_position).await?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Typed field values
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FieldValuesRequest {
    pub updates: Vec<FieldValueUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct FieldValueUpdate {
    pub field_id: Uuid,
    #[serde(default)]
    pub value: Value,
}

/// Batch-write typed field values. One invalid entry fails the whole batch
/// with nothing written.
pub async fn put_field_values(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
    Json(body): Json<FieldValuesRequest>,
) -> ApiResult<Json<Vec<FieldValueOut>>> {
    let updates: Vec<ValueUpdate> = body
        .updates
        .into_iter()
        .map(|u| ValueUpdate {
            field_id: u.field_id,
            value: u.value,
        })
        .collect();

    with_tx_retry("put_field_values", || {
        values::batch_set(&state.pool, &user.user_id, video_id, &updates)
    })
    .await?;

    let current = values::for_video(&state.pool, video_id).await?;
    Ok(Json(current.iter().map(FieldValueOut::from).collect()))
}

// ============================================================================
// Delete and retry
// ============================================================================

/// Delete a video and cancel its outstanding work.
pub async fn delete_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    videos::delete(&state.pool, &user.user_id, video_id).await?;
    // Flag checked by the worker at its next suspension point.
    state.progress.request_cancel(video_id).await.ok();
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub status: &'static str,
    pub resume_stage: String,
}

/// Manually retry a failed video from its earliest failed stage, keeping
/// prior successful artifacts.
pub async fn retry_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<RetryResponse>)> {
    let video = videos::get_for_user(&state.pool, &user.user_id, video_id).await?;
    if video.processing_status != ProcessingStatus::Failed {
        return Err(ApiError::validation("only failed videos can be retried"));
    }

    let enrichment = enrichments::get(&state.pool, video_id).await?;
    let resume = earliest_failed_stage(&video, &enrichment);

    let video_job = jobs::latest_for_video(&state.pool, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("no ingestion job for video"))?;

    jobs::reset_for_retry(&state.pool, video_job.id, resume).await?;
    videos::set_status(&state.pool, video_id, ProcessingStatus::Pending).await?;
    state.progress.clear_cancel(video_id).await.ok();

    let job = EnrichJob {
        job_id: video_job.job_id,
        video_job_id: video_job.id,
        video_id,
        list_id: video.list_id,
        user_id: user.user_id,
        youtube_id: video.youtube_id,
    };
    match state.queue.enqueue(&job).await {
        Ok(_) => {}
        Err(e) if e.is_duplicate() => {}
        Err(e) => return Err(e.into()),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(RetryResponse {
            status: "queued",
            resume_stage: resume.to_string(),
        }),
    ))
}
