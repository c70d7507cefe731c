//! Outbound side of the stream proxy.
//!
//! Builds the impersonating request for the provider and wraps the
//! provider's body so the end of every stream (finished, failed, or dropped
//! because the client went away) is observed exactly once.

use axum::body::Bytes;
use futures::Stream;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION,
    HOST, RANGE, USER_AGENT,
};
use reqwest::{Client, Method, Response};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::error::ApiError;
use crate::services::metrics;

/// Local path prefix under which all provider traffic is routed
pub const PROXY_PREFIX: &str = "/api/stream";

const ICY_METADATA: &str = "icy-metadata";

/// Map a provider playback URL to its locally-routed proxy path
pub fn stream_path(playback_url: &str) -> Option<String> {
    let url = Url::parse(playback_url).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let mut path = format!("{}{}", PROXY_PREFIX, url.path());
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}

/// How a proxied body ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Upstream body fully relayed
    Completed,
    /// Upstream errored after bytes were sent; the connection was cut
    Failed,
    /// Client went away before the end; upstream request dropped
    Aborted,
}

impl StreamOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamOutcome::Completed => "completed",
            StreamOutcome::Failed => "failed",
            StreamOutcome::Aborted => "aborted",
        }
    }
}

/// Hook run when a proxied body is dropped
pub type CloseProbe = Arc<dyn Fn(StreamOutcome) + Send + Sync>;

/// HTTP client for the provider, with the fixed impersonation headers
pub struct UpstreamClient {
    http: Client,
    authority: String,
    base_headers: HeaderMap,
    close_probe: Option<CloseProbe>,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.proxy_connect_timeout_ms))
            // upstream redirects are relayed as-is
            .redirect(reqwest::redirect::Policy::none())
            .no_gzip()
            .build()
            .map_err(|e| ApiError::Internal(format!("failed to create HTTP client: {}", e)))?;

        let authority = config.upstream_authority();
        let base_headers = impersonation_headers(&config.user_agent, &authority)?;

        Ok(Self {
            http,
            authority,
            base_headers,
            close_probe: None,
        })
    }

    /// Observe the outcome of every proxied body
    pub fn with_close_probe(mut self, probe: CloseProbe) -> Self {
        self.close_probe = Some(probe);
        self
    }

    /// `path_and_query` must start with `/`
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.authority, path_and_query)
    }

    /// Outbound headers: the fixed set, then the `Range` override if the
    /// client sent one. Nothing else from the client is forwarded.
    pub fn request_headers(&self, range: Option<&[u8]>) -> HeaderMap {
        let mut headers = self.base_headers.clone();
        if let Some(value) = range.and_then(|r| HeaderValue::from_bytes(r).ok()) {
            headers.insert(RANGE, value);
        }
        headers
    }

    /// Send the request and wait for the upstream status line and headers.
    /// No retries.
    pub async fn send(
        &self,
        method: &str,
        path_and_query: &str,
        range: Option<&[u8]>,
    ) -> Result<Response, ApiError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| ApiError::Internal(format!("invalid method: {}", e)))?;
        let url = self.upstream_url(path_and_query);

        tracing::debug!(%method, path = path_and_query, range = range.is_some(), "proxying upstream");

        self.http
            .request(method, &url)
            .headers(self.request_headers(range))
            .send()
            .await
            .map_err(|e| {
                metrics::PROXY_REQUESTS.with_label_values(&["upstream_error"]).inc();
                tracing::error!("Upstream request failed for {}: {}", path_and_query, e);
                if e.is_timeout() {
                    ApiError::UpstreamTimeout(e.to_string())
                } else {
                    ApiError::UpstreamUnreachable(e.to_string())
                }
            })
    }

    /// Wrap an upstream response body for streaming to the client
    pub fn body_stream(&self, response: Response, path: &str) -> ProxyBody {
        ProxyBody::new(
            Box::pin(response.bytes_stream()),
            path.to_string(),
            self.close_probe.clone(),
        )
    }
}

fn impersonation_headers(user_agent: &str, authority: &str) -> Result<HeaderMap, ApiError> {
    let invalid = |what: &str| ApiError::Internal(format!("invalid {} header value", what));

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).map_err(|_| invalid("user-agent"))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    // identity keeps byte offsets of range responses meaningful
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(HeaderName::from_static(ICY_METADATA), HeaderValue::from_static("1"));
    headers.insert(
        HOST,
        HeaderValue::from_str(authority).map_err(|_| invalid("host"))?,
    );
    Ok(headers)
}

type UpstreamBytes = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Upstream body relayed chunk by chunk.
///
/// Dropping it (hyper does so when the client disconnects) drops the
/// upstream response and closes that connection.
pub struct ProxyBody {
    inner: UpstreamBytes,
    path: String,
    bytes_sent: u64,
    outcome: Option<StreamOutcome>,
    close_probe: Option<CloseProbe>,
}

impl ProxyBody {
    fn new(inner: UpstreamBytes, path: String, close_probe: Option<CloseProbe>) -> Self {
        metrics::PROXY_ACTIVE_STREAMS.inc();
        Self {
            inner,
            path,
            bytes_sent: 0,
            outcome: None,
            close_probe,
        }
    }
}

impl Stream for ProxyBody {
    type Item = Result<Bytes, reqwest::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.outcome.is_some() {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(
                    path = %this.path,
                    bytes_sent = this.bytes_sent,
                    "upstream stream error, cutting connection: {}",
                    e
                );
                this.outcome = Some(StreamOutcome::Failed);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.outcome = Some(StreamOutcome::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ProxyBody {
    fn drop(&mut self) {
        let outcome = self.outcome.unwrap_or(StreamOutcome::Aborted);

        metrics::PROXY_ACTIVE_STREAMS.dec();
        metrics::PROXY_REQUESTS.with_label_values(&[outcome.as_str()]).inc();
        tracing::info!(
            path = %self.path,
            bytes_sent = self.bytes_sent,
            outcome = outcome.as_str(),
            "stream closed"
        );

        if let Some(probe) = &self.close_probe {
            probe(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_config;

    #[test]
    fn test_stream_path() {
        assert_eq!(
            stream_path("http://provider.tv:8080/live/user/pass/1.ts").as_deref(),
            Some("/api/stream/live/user/pass/1.ts")
        );
        assert_eq!(
            stream_path("http://provider.tv/movie/u/p/3.mp4?token=abc").as_deref(),
            Some("/api/stream/movie/u/p/3.mp4?token=abc")
        );
        assert_eq!(stream_path("not a url"), None);
        assert_eq!(stream_path("rtmp://provider.tv/live"), None);
    }

    #[test]
    fn test_request_headers_are_replaced_not_merged() {
        let mut config = test_config();
        config.upstream_host = "provider.tv".to_string();
        config.upstream_port = 8080;
        let client = UpstreamClient::new(&config).unwrap();

        let headers = client.request_headers(None);
        assert_eq!(headers.get(USER_AGENT).unwrap(), "VLC/3.0.20 LibVLC/3.0.20");
        assert_eq!(headers.get(ACCEPT).unwrap(), "*/*");
        assert_eq!(headers.get(ACCEPT_ENCODING).unwrap(), "identity");
        assert_eq!(headers.get(CONNECTION).unwrap(), "keep-alive");
        assert_eq!(headers.get("icy-metadata").unwrap(), "1");
        assert_eq!(headers.get(HOST).unwrap(), "provider.tv:8080");
        assert!(headers.get(RANGE).is_none());
        assert_eq!(headers.len(), 7);

        let headers = client.request_headers(Some(b"bytes=1000-"));
        assert_eq!(headers.get(RANGE).unwrap(), "bytes=1000-");
        assert_eq!(headers.len(), 8);
    }

    #[test]
    fn test_upstream_url() {
        let mut config = test_config();
        config.upstream_host = "provider.tv".to_string();
        config.upstream_port = 8080;
        let client = UpstreamClient::new(&config).unwrap();
        assert_eq!(
            client.upstream_url("/live/1.ts?x=1"),
            "http://provider.tv:8080/live/1.ts?x=1"
        );
    }
}
