use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{
    CatalogQuery, CategoriesResponse, ChannelView, ChannelsResponse, SeriesResponse,
};
use crate::services::catalog::ChannelFilter;
use crate::services::upstream::stream_path;
use crate::AppState;

/// Upper bound for a single page of channels
const MAX_ITEMS_PAGE: usize = 5000;

/// GET /api/playlist - Raw playlist text (cached or freshly loaded)
pub async fn get_playlist(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let content = state.playlist().await?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/x-mpegurl; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        content.to_string(),
    )
        .into_response())
}

/// GET /api/catalog/categories - Categories with entry counts
pub async fn get_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let catalog = state.catalog().await?;
    let categories = catalog.list_categories();

    Ok(Json(CategoriesResponse {
        total: categories.len(),
        categories,
    }))
}

/// GET /api/catalog/channels?category=&search=&limit=&offset=
/// Filtered channels plus the grouping mode the view should use
pub async fn get_channels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ChannelsResponse>, ApiError> {
    let catalog = state.catalog().await?;
    let filter = ChannelFilter::new(query.category.as_deref(), query.search.as_deref());

    let matching = catalog.query_channels(&filter);
    let total = matching.len();
    let limit = query.limit.clamp(1, MAX_ITEMS_PAGE);

    let items: Vec<ChannelView> = matching
        .into_iter()
        .skip(query.offset)
        .take(limit)
        .map(|entry| ChannelView {
            stream_path: stream_path(&entry.playback_url),
            entry: entry.clone(),
        })
        .collect();

    Ok(Json(ChannelsResponse {
        mode: catalog.grouping_mode(&filter),
        has_more: query.offset + items.len() < total,
        items,
        total,
        limit,
        offset: query.offset,
    }))
}

/// GET /api/catalog/series?category=&search= - Series with ordered episodes
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let catalog = state.catalog().await?;
    let filter = ChannelFilter::new(query.category.as_deref(), query.search.as_deref());
    let series = catalog.list_series(&filter);

    Ok(Json(SeriesResponse {
        total: series.len(),
        series,
    }))
}
