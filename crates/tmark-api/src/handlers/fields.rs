//! Field catalog handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tmark_models::{CustomField, FieldType};
use tmark_store::{fields, lists};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFieldRequest {
    pub name: String,
    pub field_type: String,
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    serde_json::json!({})
}

fn parse_field_type(raw: &str) -> ApiResult<FieldType> {
    raw.parse::<FieldType>().map_err(ApiError::Validation)
}

/// Create a custom field in a list.
pub async fn create_field(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
    Json(body): Json<CreateFieldRequest>,
) -> ApiResult<(StatusCode, Json<CustomField>)> {
    lists::get(&state.pool, &user.user_id, list_id).await?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("field name must not be empty"));
    }

    let field_type = parse_field_type(&body.field_type)?;
    let field = fields::create(&state.pool, list_id, name, field_type, &body.config).await?;
    Ok((StatusCode::CREATED, Json(field)))
}

/// List a list's fields.
pub async fn list_fields(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CustomField>>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;
    Ok(Json(fields::list_for_list(&state.pool, list_id).await?))
}

/// Fetch one field.
pub async fn get_field(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, field_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<CustomField>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;
    Ok(Json(fields::get(&state.pool, list_id, field_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub name: Option<String>,
    pub field_type: Option<String>,
    pub config: Option<Value>,
    /// Destructive changes (type change with values, narrowing a config
    /// below stored values) proceed only when set.
    #[serde(default)]
    pub confirm: bool,
}

/// Update a field's name or config.
pub async fn update_field(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, field_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateFieldRequest>,
) -> ApiResult<Json<CustomField>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;

    let new_type = body
        .field_type
        .as_deref()
        .map(parse_field_type)
        .transpose()?;

    let field = fields::update(
        &state.pool,
        list_id,
        field_id,
        body.name.as_deref().map(str::trim),
        new_type,
        body.config.as_ref(),
        body.confirm,
    )
    .await?;
    Ok(Json(field))
}

/// Delete a field. Blocked with `field_in_use` while referenced.
pub async fn delete_field(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, field_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    lists::get(&state.pool, &user.user_id, list_id).await?;
    fields::delete(&state.pool, list_id, field_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CheckDuplicateRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CheckDuplicateResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<CustomField>,
}

/// Case-insensitive duplicate probe for inline creation UIs. Clients are
/// expected to debounce; there is no extra server-side limiting beyond the
/// standard per-IP caps.
pub async fn check_duplicate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
    Json(body): Json<CheckDuplicateRequest>,
) -> ApiResult<Json<CheckDuplicateResponse>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;

    let field = fields::check_duplicate(&state.pool, list_id, body.name.trim()).await?;
    Ok(Json(CheckDuplicateResponse {
        exists: field.is_some(),
        field,
    }))
}
