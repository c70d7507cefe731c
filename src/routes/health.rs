use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Playlist cache stats
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistCacheStats {
    loaded: bool,
    fresh: bool,
    size_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    loaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    uptime: u64,
    active_streams: i64,
    playlist: PlaylistCacheStats,
}

/// GET /health - Process health and playlist cache state
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let cache = state.cache.status().await;
    let size_mb = cache.size_bytes as f64 / 1024.0 / 1024.0;

    // an expired or missing playlist is reloaded on demand, not a failure
    let status = if cache.loaded && cache.fresh { "ok" } else { "idle" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime,
        active_streams: crate::services::metrics::PROXY_ACTIVE_STREAMS.get(),
        playlist: PlaylistCacheStats {
            loaded: cache.loaded,
            fresh: cache.fresh,
            size_mb: (size_mb * 100.0).round() / 100.0,
            loaded_at: cache.loaded_at,
        },
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Liveness probe
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

#[cfg(test)]
mod tests {
    use crate::test_support::{test_config, test_state_with};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_before_first_load() {
        let state = test_state_with(test_config(), |u| u);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = crate::build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "idle");
        assert_eq!(body["playlist"]["loaded"], false);
        // provider details never leak through the API
        assert!(!String::from_utf8_lossy(&bytes).contains("upstream"));
    }

    #[tokio::test]
    async fn test_metrics_exposed() {
        crate::services::metrics::PROXY_ACTIVE_STREAMS.get();
        let state = test_state_with(test_config(), |u| u);
        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = crate::build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("proxy_active_streams"));
    }
}
