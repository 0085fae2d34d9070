//! Field schema handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tmark_models::{FieldSchema, SchemaField};
use tmark_store::schemas::{self, SchemaWithFields};
use tmark_store::lists;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SchemaOut {
    #[serde(flatten)]
    pub schema: FieldSchema,
    pub fields: Vec<SchemaField>,
}

impl From<SchemaWithFields> for SchemaOut {
    fn from(s: SchemaWithFields) -> Self {
        Self {
            schema: s.schema,
            fields: s.fields,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSchemaRequest {
    pub name: String,
    #[serde(default)]
    pub is_workspace_default: bool,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

/// Create a schema with its initial memberships.
pub async fn create_schema(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
    Json(body): Json<CreateSchemaRequest>,
) -> ApiResult<(StatusCode, Json<SchemaOut>)> {
    lists::get(&state.pool, &user.user_id, list_id).await?;

    let schema = schemas::create(
        &state.pool,
        list_id,
        body.name.trim(),
        body.is_workspace_default,
        &body.fields,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(schema.into())))
}

/// List a list's schemas.
pub async fn list_schemas(
    State(state): State<AppState>,
    user: AuthUser,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<SchemaOut>>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;
    let all = schemas::list_for_list(&state.pool, list_id).await?;
    Ok(Json(all.into_iter().map(SchemaOut::from).collect()))
}

/// Fetch one schema with its memberships.
pub async fn get_schema(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, schema_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<SchemaOut>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;
    let schema = schemas::get(&state.pool, list_id, schema_id).await?;
    Ok(Json(schema.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSchemaRequest {
    pub name: Option<String>,
    /// Full replacement of the membership set
    pub fields: Option<Vec<SchemaField>>,
}

/// Update a schema's name and/or replace its memberships.
pub async fn update_schema(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, schema_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateSchemaRequest>,
) -> ApiResult<Json<SchemaOut>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;

    let schema = schemas::update(
        &state.pool,
        list_id,
        schema_id,
        body.name.as_deref().map(str::trim),
        body.fields.as_deref(),
    )
    .await?;
    Ok(Json(schema.into()))
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub fields: Vec<ReorderEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderEntry {
    pub field_id: Uuid,
    pub display_order: i32,
}

/// Apply a full reorder atomically.
pub async fn reorder_schema(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, schema_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ReorderRequest>,
) -> ApiResult<Json<SchemaOut>> {
    lists::get(&state.pool, &user.user_id, list_id).await?;

    let orders: Vec<(Uuid, i32)> = body
        .fields
        .iter()
        .map(|e| (e.field_id, e.display_order))
        .collect();
    let schema = schemas::reorder(&state.pool, list_id, schema_id, &orders).await?;
    Ok(Json(schema.into()))
}

/// Delete a schema.
pub async fn delete_schema(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, schema_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    lists::get(&state.pool, &user.user_id, list_id).await?;
    schemas::delete(&state.pool, list_id, schema_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
