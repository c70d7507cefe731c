use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::services::upstream::UpstreamClient;
use crate::AppState;

/// Configuration with no playlist source and an unreachable upstream
pub fn test_config() -> Config {
    let missing = std::env::temp_dir().join("iptv-gateway-missing");
    Config {
        port: 0,
        node_env: "test".to_string(),
        static_dir: missing.join("public").display().to_string(),
        upstream_host: "127.0.0.1".to_string(),
        upstream_port: 9,
        playlist_content: None,
        playlist_url: None,
        playlist_private_path: missing.join("private.m3u").display().to_string(),
        playlist_public_path: missing.join("public.m3u").display().to_string(),
        playlist_cache_ttl_ms: 3_600_000,
        fetch_timeout_ms: 5_000,
        proxy_connect_timeout_ms: 2_000,
        user_agent: "VLC/3.0.20 LibVLC/3.0.20".to_string(),
    }
}

/// App state for `config`, letting the test adjust the upstream client
pub fn test_state_with(
    config: Config,
    customize: impl FnOnce(UpstreamClient) -> UpstreamClient,
) -> Arc<AppState> {
    let mut state = AppState::new(config).unwrap();
    let upstream = UpstreamClient::new(&state.config).unwrap();
    state.upstream = customize(upstream);
    Arc::new(state)
}

/// Serve `app` on an ephemeral local port
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
