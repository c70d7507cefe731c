use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::routes::cors::apply_cors_headers;
use crate::services::upstream::PROXY_PREFIX;
use crate::AppState;

/// Copy upstream headers (reqwest's `http` types) onto the client response,
/// dropping `transfer-encoding`: framing towards the client is ours.
fn relay_headers(upstream: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 4);

    for (name, value) in upstream.iter() {
        if *name == reqwest::header::TRANSFER_ENCODING {
            continue;
        }
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) else {
            continue;
        };
        headers.append(name, value);
    }

    apply_cors_headers(&mut headers);
    headers
}

/// ANY /api/stream/*path
///
/// Forwards the request to the configured provider with impersonation
/// headers (only `Range` is taken from the client) and streams the response
/// back as it arrives. Errors before the upstream answers become a JSON
/// gateway error; errors mid-body cut the connection.
pub async fn stream_proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let upstream_path = path_and_query
        .strip_prefix(PROXY_PREFIX)
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or("/");

    let range = headers.get(header::RANGE).map(|v| v.as_bytes());

    let upstream = state
        .upstream
        .send(method.as_str(), upstream_path, range)
        .await?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let response_headers = relay_headers(upstream.headers());

    tracing::info!(
        path = upstream_path,
        status = status.as_u16(),
        range = range.is_some(),
        "upstream responded, streaming"
    );

    let body = Body::from_stream(state.upstream.body_stream(upstream, upstream_path));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
