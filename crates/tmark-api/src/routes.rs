//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::fields::{
    check_duplicate, create_field, delete_field, get_field, list_fields, update_field,
};
use crate::handlers::jobs::replay_progress;
use crate::handlers::lists::{create_list, delete_list, get_list, list_lists};
use crate::handlers::schemas::{
    create_schema, delete_schema, get_schema, list_schemas, reorder_schema, update_schema,
};
use crate::handlers::tags::{
    attach_tag, create_tag, delete_tag, detach_tag, list_tags, restore_fields, update_tag,
};
use crate::handlers::videos::{
    bulk_ingest, delete_video, get_video, list_videos, put_field_values, retry_video,
    update_watch_progress,
};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, RateLimiterCache,
};
use crate::state::AppState;
use crate::ws::ws_endpoint;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let list_routes = Router::new()
        .route("/lists", get(list_lists))
        .route("/lists", post(create_list))
        .route("/lists/:list_id", get(get_list))
        .route("/lists/:list_id", delete(delete_list));

    let video_routes = Router::new()
        .route("/lists/:list_id/videos/bulk", post(bulk_ingest))
        .route("/lists/:list_id/videos", get(list_videos))
        .route("/videos/:video_id", get(get_video))
        .route("/videos/:video_id", delete(delete_video))
        .route("/videos/:video_id/progress", patch(update_watch_progress))
        .route("/videos/:video_id/fields", put(put_field_values))
        .route("/videos/:video_id/retry", post(retry_video))
        .route("/videos/:video_id/tags/:tag_id", put(attach_tag))
        .route("/videos/:video_id/tags/:tag_id", delete(detach_tag))
        .route("/videos/:video_id/restore-fields", post(restore_fields));

    let field_routes = Router::new()
        .route("/lists/:list_id/custom-fields", get(list_fields))
        .route("/lists/:list_id/custom-fields", post(create_field))
        .route("/lists/:list_id/custom-fields/:field_id", get(get_field))
        .route("/lists/:list_id/custom-fields/:field_id", put(update_field))
        .route(
            "/lists/:list_id/custom-fields/:field_id",
            delete(delete_field),
        )
        .route(
            "/lists/:list_id/custom-fields/check-duplicate",
            post(check_duplicate),
        );

    let schema_routes = Router::new()
        .route("/lists/:list_id/schemas", get(list_schemas))
        .route("/lists/:list_id/schemas", post(create_schema))
        .route("/lists/:list_id/schemas/:schema_id", get(get_schema))
        .route("/lists/:list_id/schemas/:schema_id", put(update_schema))
        .route("/lists/:list_id/schemas/:schema_id", delete(delete_schema))
        .route(
            "/lists/:list_id/schemas/:schema_id/reorder",
            put(reorder_schema),
        );

    let tag_routes = Router::new()
        .route("/tags", get(list_tags))
        .route("/tags", post(create_tag))
        .route("/tags/:tag_id", put(update_tag))
        .route("/tags/:tag_id", delete(delete_tag));

    let job_routes = Router::new().route("/jobs/:job_id/progress", post(replay_progress));

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(list_routes)
        .merge(video_routes)
        .merge(field_routes)
        .merge(schema_routes)
        .merge(tag_routes)
        .merge(job_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let ws_routes = Router::new().route("/ws", get(ws_endpoint));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
