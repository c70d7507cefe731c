mod config;
mod error;
mod models;
mod routes;
mod services;

#[cfg(test)]
mod test_support;

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::ApiError;
use crate::services::{
    cache::PlaylistCache,
    catalog::{Catalog, CatalogStore},
    loader::PlaylistLoader,
    upstream::{UpstreamClient, PROXY_PREFIX},
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub loader: PlaylistLoader,
    pub cache: PlaylistCache,
    pub catalog: CatalogStore,
    pub upstream: UpstreamClient,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        Ok(Self {
            loader: PlaylistLoader::new(&config)?,
            cache: PlaylistCache::new(Duration::from_millis(config.playlist_cache_ttl_ms)),
            catalog: CatalogStore::new(),
            upstream: UpstreamClient::new(&config)?,
            start_time: Instant::now(),
            config,
        })
    }

    /// Cached playlist text, reloaded from the configured source on expiry
    pub async fn playlist(&self) -> Result<Arc<str>, ApiError> {
        self.cache.get_or_load(|| self.loader.load()).await
    }

    /// Catalog for the current playlist
    pub async fn catalog(&self) -> Result<Arc<Catalog>, ApiError> {
        let playlist = self.playlist().await?;
        Ok(self.catalog.catalog_for(playlist).await)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let index = format!("{}/index.html", state.config.static_dir);
    let static_files = ServeDir::new(&state.config.static_dir).fallback(ServeFile::new(index));

    // JSON/text endpoints can be compressed; proxied streams must not be
    let api = Router::new()
        .route("/api/playlist", get(routes::playlist::get_playlist))
        .route("/api/catalog/categories", get(routes::playlist::get_categories))
        .route("/api/catalog/channels", get(routes::playlist::get_channels))
        .route("/api/catalog/series", get(routes::playlist::get_series))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/live", get(routes::health::live))
        .layer(CompressionLayer::new());

    Router::new()
        .route(&format!("{}/*path", PROXY_PREFIX), any(routes::proxy::stream_proxy))
        .merge(api)
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(routes::cors::cors))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting IPTV Gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.node_env);
    tracing::info!(
        inline = config.playlist_content.is_some(),
        remote = config.playlist_url.is_some(),
        "Playlist sources configured"
    );

    let state = Arc::new(AppState::new(config)?);
    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
