//! List handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use tmark_models::List;
use tmark_store::lists;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// Create a list.
pub async fn create_list(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateListRequest>,
) -> ApiResult<(StatusCode, Json<List>)> {
    body.validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("list name must not be empty"));
    }
    let list = lists::create(&state.pool, &user.user_id, name).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// The user's lists.
pub async fn list_lists(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<List>>> {
    Ok(Json(lists::list_for_user(&state.pool, &user.user_id).await?))
}

/// Fetch one list.
pub async fn get_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<List>> {
    Ok(Json(lists::get(&state.pool, &user.user_id, list_id).await?))
}

/// Delete a list, canceling outstanding enrichment for its videos.
pub async fn delete_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let video_ids = lists::delete(&state.pool, &user.user_id, list_id).await?;
    for video_id in video_ids {
        state.progress.request_cancel(video_id).await.ok();
    }
    Ok(StatusCode::NO_CONTENT)
}
