use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

lazy_static! {
    /// Proxy requests by outcome (`completed`, `failed`, `aborted`, `upstream_error`)
    pub static ref PROXY_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "proxy_requests_total",
        "Stream proxy requests by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Response bodies currently being streamed to clients
    pub static ref PROXY_ACTIVE_STREAMS: IntGauge = register_int_gauge!(
        "proxy_active_streams",
        "Proxied response bodies currently open"
    )
    .unwrap();

    /// Successful playlist loads by source
    pub static ref PLAYLIST_LOADS: IntCounterVec = register_int_counter_vec!(
        "playlist_loads_total",
        "Playlist loads by source",
        &["source"]
    )
    .unwrap();
}
