//! Prometheus metrics.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder; the handle renders `/metrics`.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record request counts and latency per route.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "tmark_http_requests_total",
        "method" => method.clone(), "path" => path.clone(), "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "tmark_http_request_duration_seconds",
        "method" => method, "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Count WebSocket connections.
pub fn record_ws_connection() {
    metrics::counter!("tmark_ws_connections_total").increment(1);
}

/// Track currently open WebSocket connections.
pub fn set_ws_active_connections(count: i64) {
    metrics::gauge!("tmark_ws_active_connections").set(count as f64);
}

/// Count intermediate progress events dropped for slow consumers. This is
/// the only place a backpressure drop is observable.
pub fn record_backpressure_drop() {
    metrics::counter!("tmark_ws_backpressure_drops_total").increment(1);
}
