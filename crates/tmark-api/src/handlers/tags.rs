//! Tag handlers: CRUD, attachment, and category backup/restore.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use tmark_models::Tag;
use tmark_store::{retry::with_tx_retry, tags};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub is_video_type: bool,
    pub schema_id: Option<Uuid>,
}

/// Create a tag.
pub async fn create_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    body.validate()
        .map_err(|e| crate::error::ApiError::validation(e.to_string()))?;
    let tag = tags::create(
        &state.pool,
        &user.user_id,
        &body.name,
        &body.color,
        body.is_video_type,
        body.schema_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// List the user's tags.
pub async fn list_tags(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(tags::list_for_user(&state.pool, &user.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    /// `Some(None)` clears the schema reference
    #[serde(default, with = "double_option")]
    pub schema_id: Option<Option<Uuid>>,
}

/// Distinguishes "absent" from "null" for nullable fields.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Update a tag.
pub async fn update_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path(tag_id): Path<Uuid>,
    Json(body): Json<UpdateTagRequest>,
) -> ApiResult<Json<Tag>> {
    let tag = tags::update(
        &state.pool,
        &user.user_id,
        tag_id,
        body.name.as_deref(),
        body.color.as_deref(),
        body.schema_id,
    )
    .await?;
    Ok(Json(tag))
}

/// Delete a tag.
pub async fn delete_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path(tag_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tags::delete(&state.pool, &user.user_id, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct AttachTagRequest {
    /// Required to replace an existing category (triggering the value
    /// backup); attaching a second category without it is rejected.
    #[serde(default)]
    pub replace_category: bool,
}

#[derive(Debug, Serialize)]
pub struct AttachTagResponse {
    /// A backup exists for this `(video, category)`; the client may offer a
    /// restore.
    pub restore_available: bool,
}

/// Attach a tag to a video. Clients without options send `{}`.
pub async fn attach_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path((video_id, tag_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<AttachTagRequest>,
) -> ApiResult<Json<AttachTagResponse>> {
    let replace_category = body.replace_category;

    let outcome = with_tx_retry("attach_tag", || {
        tags::attach(
            &state.pool,
            &user.user_id,
            video_id,
            tag_id,
            replace_category,
        )
    })
    .await?;

    Ok(Json(AttachTagResponse {
        restore_available: outcome.restore_available,
    }))
}

/// Detach a tag from a video.
pub async fn detach_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path((video_id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    with_tx_retry("detach_tag", || {
        tags::detach(&state.pool, &user.user_id, video_id, tag_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RestoreFieldsRequest {
    pub category_tag_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RestoreFieldsResponse {
    pub restored: usize,
}

/// Restore the backed-up values of the video's current category.
pub async fn restore_fields(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<Uuid>,
    Json(body): Json<RestoreFieldsRequest>,
) -> ApiResult<Json<RestoreFieldsResponse>> {
    let restored = with_tx_retry("restore_fields", || {
        tags::restore(&state.pool, &user.user_id, video_id, body.category_tag_id)
    })
    .await?;
    Ok(Json(RestoreFieldsResponse { restored }))
}
