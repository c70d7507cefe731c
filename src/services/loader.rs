use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::error::ApiError;
use crate::services::metrics;

/// Where a playlist was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistSource {
    Inline,
    Remote,
    PrivateFile,
    PublicFile,
}

impl PlaylistSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistSource::Inline => "inline",
            PlaylistSource::Remote => "remote",
            PlaylistSource::PrivateFile => "private_file",
            PlaylistSource::PublicFile => "public_file",
        }
    }
}

/// Resolves the playlist text from the configured sources.
///
/// Order: inline content, remote URL, private file, public file. The first
/// configured source wins; a remote URL that fails is reported, not skipped.
pub struct PlaylistLoader {
    client: Client,
    inline: Option<String>,
    url: Option<String>,
    private_path: PathBuf,
    public_path: PathBuf,
}

impl PlaylistLoader {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .gzip(true)
            .build()
            .map_err(|e| ApiError::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            inline: config.playlist_content.clone(),
            url: config.playlist_url.clone(),
            private_path: PathBuf::from(&config.playlist_private_path),
            public_path: PathBuf::from(&config.playlist_public_path),
        })
    }

    /// Load the playlist from the first source that resolves
    pub async fn load(&self) -> Result<String, ApiError> {
        let (source, content) = self.load_with_source().await?;
        metrics::PLAYLIST_LOADS.with_label_values(&[source.as_str()]).inc();
        tracing::info!(source = source.as_str(), bytes = content.len(), "playlist loaded");
        Ok(content)
    }

    pub async fn load_with_source(&self) -> Result<(PlaylistSource, String), ApiError> {
        if let Some(inline) = &self.inline {
            return decode_inline(inline).map(|text| (PlaylistSource::Inline, text));
        }

        if let Some(url) = &self.url {
            return self
                .fetch_remote(url)
                .await
                .map(|text| (PlaylistSource::Remote, text));
        }

        if let Some(text) = read_playlist_file(&self.private_path).await {
            return Ok((PlaylistSource::PrivateFile, text));
        }

        if let Some(text) = read_playlist_file(&self.public_path).await {
            return Ok((PlaylistSource::PublicFile, text));
        }

        tracing::warn!("no playlist source configured");
        Err(ApiError::NotConfigured)
    }

    async fn fetch_remote(&self, url: &str) -> Result<String, ApiError> {
        tracing::info!("Fetching playlist from remote URL");

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::error!("Playlist fetch failed: {}", e);
            ApiError::SourceUnavailable(format!("playlist fetch failed: {}", e))
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or("Error");
            tracing::error!("Playlist fetch returned HTTP {}", status.as_u16());
            return Err(ApiError::SourceUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                reason
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::SourceUnavailable(format!("failed to read playlist body: {}", e)))
    }
}

/// Inline content is base64; raw M3U text is accepted as well
fn decode_inline(inline: &str) -> Result<String, ApiError> {
    let compact: String = inline.chars().filter(|c| !c.is_whitespace()).collect();
    if let Ok(bytes) = STANDARD.decode(compact.as_bytes()) {
        if let Ok(text) = String::from_utf8(bytes) {
            return Ok(text);
        }
    }

    if inline.contains("#EXTM3U") || inline.contains("#EXTINF") {
        return Ok(inline.to_string());
    }

    Err(ApiError::SourceUnavailable(
        "inline playlist is neither base64 nor M3U text".to_string(),
    ))
}

async fn read_playlist_file(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("Failed to read playlist file {}: {}", path.display(), e);
            None
        }
    }
}
