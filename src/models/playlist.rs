use serde::{Deserialize, Serialize};

/// Single playable item (channel, movie or episode)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEntry {
    pub id: String,
    pub display_name: String,
    pub group_name: String,
    /// Possibly rewritten to a working image host, empty when absent
    pub logo_url: String,
    /// Literal upstream URL as found in the playlist
    pub playback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
}

/// Extracted series info from a display name (`Title S01 E02`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSeriesInfo {
    pub series_name: String,
    pub season: u32,
    pub episode: u32,
}

/// Group/category with the number of entries in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub count: usize,
}

/// How a filtered view should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    Flat,
    Series,
}

impl std::fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupingMode::Flat => write!(f, "flat"),
            GroupingMode::Series => write!(f, "series"),
        }
    }
}

/// Season with its episodes in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub season_number: u32,
    pub episodes: Vec<ChannelEntry>,
}

/// Series aggregate (episodes grouped by inferred title)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub name: String,
    pub logo: String,
    pub season_count: usize,
    pub episode_count: usize,
    /// Sorted by (season, episode), unset numbers sort as 0
    pub episodes: Vec<ChannelEntry>,
    pub seasons: Vec<Season>,
}

/// Channel as returned to the browser, with its proxied stream path
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    #[serde(flatten)]
    pub entry: ChannelEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_path: Option<String>,
}

/// Query parameters shared by the catalog endpoints
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    200
}

/// Categories response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
    pub total: usize,
}

/// Paginated channels response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsResponse {
    pub mode: GroupingMode,
    pub items: Vec<ChannelView>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// Series response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub series: Vec<Series>,
    pub total: usize,
}
