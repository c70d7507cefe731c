use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub node_env: String,
    pub static_dir: String,

    // Upstream provider (never exposed to the browser)
    pub upstream_host: String,
    pub upstream_port: u16,

    // Playlist sources, resolved in this order
    pub playlist_content: Option<String>,
    pub playlist_url: Option<String>,
    pub playlist_private_path: String,
    pub playlist_public_path: String,

    // Playlist cache / fetch
    pub playlist_cache_ttl_ms: u64,
    pub fetch_timeout_ms: u64,

    // Stream proxy
    pub proxy_connect_timeout_ms: u64,

    // Misc
    pub user_agent: String,
}

/// Read an optional variable, treating blank values as unset
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),
            node_env: env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string()),

            // Upstream
            upstream_host: env::var("UPSTREAM_HOST").unwrap_or_else(|_| "localhost".to_string()),
            upstream_port: env::var("UPSTREAM_PORT")
                .unwrap_or_else(|_| "80".to_string())
                .parse()
                .unwrap_or(80),

            // Playlist sources
            playlist_content: non_empty_var("PLAYLIST_CONTENT"),
            playlist_url: non_empty_var("PLAYLIST_URL"),
            playlist_private_path: env::var("PLAYLIST_PRIVATE_PATH")
                .unwrap_or_else(|_| "data/playlist.m3u".to_string()),
            playlist_public_path: env::var("PLAYLIST_PUBLIC_PATH")
                .unwrap_or_else(|_| "public/playlist.m3u".to_string()),

            // Cache
            playlist_cache_ttl_ms: env::var("PLAYLIST_CACHE_TTL_MS")
                .unwrap_or_else(|_| "3600000".to_string())
                .parse()
                .unwrap_or(3_600_000), // 1 hour

            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "60000".to_string())
                .parse()
                .unwrap_or(60_000),

            // Proxy
            proxy_connect_timeout_ms: env::var("PROXY_CONNECT_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10_000), // 10 seconds

            // Misc - VLC user agent, most IPTV panels reject browsers
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "VLC/3.0.20 LibVLC/3.0.20".to_string()),
        }
    }

    /// `host:port` authority of the upstream provider
    pub fn upstream_authority(&self) -> String {
        format!("{}:{}", self.upstream_host, self.upstream_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
