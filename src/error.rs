use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors surfaced at the request boundary.
///
/// Every variant renders as `{ "error": <kind>, "detail": <message> }` so the
/// front-end can branch on `error` and show `detail`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No playlist source is configured or none of them resolved
    #[error("no playlist source is configured")]
    NotConfigured,

    /// A configured playlist source could not be read
    #[error("playlist source unavailable: {0}")]
    SourceUnavailable(String),

    /// The proxy could not open a connection to the provider
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The provider did not accept the connection in time
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable kind sent as the `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotConfigured => "not_configured",
            ApiError::SourceUnavailable(_) => "source_unavailable",
            ApiError::UpstreamUnreachable(_) => "upstream_unreachable",
            ApiError::UpstreamTimeout(_) => "upstream_timeout",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotConfigured => StatusCode::NOT_FOUND,
            ApiError::SourceUnavailable(_) | ApiError::UpstreamUnreachable(_) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({
                "error": self.kind(),
                "detail": self.to_string(),
            })),
        )
            .into_response()
    }
}
