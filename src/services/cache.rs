use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use crate::error::ApiError;

/// Last successfully loaded playlist
#[derive(Debug, Clone)]
struct CachedPlaylist {
    content: Arc<str>,
    loaded_at: Instant,
    loaded_at_utc: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default)]
struct CacheState {
    current: Option<CachedPlaylist>,
    /// Bumped on every successful store
    generation: u64,
}

/// Snapshot of the cache for the health endpoint
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub loaded: bool,
    pub fresh: bool,
    pub size_bytes: usize,
    pub loaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// In-memory playlist cache, invalidated purely by age.
///
/// Reloads are single-flight: callers that find the cache stale while a
/// reload is running wait for it and share its result. Content is swapped
/// in one write, so readers see either the old or the new playlist.
pub struct PlaylistCache {
    ttl: Duration,
    state: RwLock<CacheState>,
    reload: Mutex<()>,
}

impl PlaylistCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
            reload: Mutex::new(()),
        }
    }

    fn is_fresh(&self, cached: &CachedPlaylist) -> bool {
        cached.loaded_at.elapsed() < self.ttl
    }

    /// Cached content if it is still within the TTL
    pub async fn get(&self) -> Option<Arc<str>> {
        let state = self.state.read().await;
        state
            .current
            .as_ref()
            .filter(|cached| self.is_fresh(cached))
            .map(|cached| cached.content.clone())
    }

    /// Store content loaded at `loaded_at`, replacing whatever was cached
    pub async fn set(&self, content: Arc<str>, loaded_at: Instant) {
        let mut state = self.state.write().await;
        state.current = Some(CachedPlaylist {
            content,
            loaded_at,
            loaded_at_utc: chrono::Utc::now(),
        });
        state.generation += 1;
    }

    /// Fresh cached content, or the result of `load` run at most once for
    /// all concurrent callers. A failed load keeps the previous value.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<str>, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        let seen_generation = {
            let state = self.state.read().await;
            if let Some(cached) = state.current.as_ref().filter(|c| self.is_fresh(c)) {
                return Ok(cached.content.clone());
            }
            state.generation
        };

        let _reload_guard = self.reload.lock().await;

        {
            let state = self.state.read().await;
            if state.generation != seen_generation {
                if let Some(cached) = state.current.as_ref() {
                    tracing::debug!("playlist reloaded by a concurrent request");
                    return Ok(cached.content.clone());
                }
            }
        }

        tracing::info!("playlist cache miss, loading");
        let content: Arc<str> = Arc::from(load().await?);
        self.set(content.clone(), Instant::now()).await;
        tracing::info!(bytes = content.len(), "playlist cached");

        Ok(content)
    }

    pub async fn status(&self) -> CacheStatus {
        let state = self.state.read().await;
        match state.current.as_ref() {
            Some(cached) => CacheStatus {
                loaded: true,
                fresh: self.is_fresh(cached),
                size_bytes: cached.content.len(),
                loaded_at: Some(cached.loaded_at_utc),
            },
            None => CacheStatus {
                loaded: false,
                fresh: false,
                size_bytes: 0,
                loaded_at: None,
            },
        }
    }
}
