use lazy_static::lazy_static;
use regex::Regex;

use crate::models::ExtractedSeriesInfo;

/// Provider host whose image endpoint is permanently broken
pub const BROKEN_LOGO_HOST: &str = "assistirpainel.net";

/// Image host the broken logos are mirrored on (same image ids)
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

lazy_static! {
    // ============ SERIES INFO PATTERNS ============
    /// Trailing `Title S01 E02`; `S`/`E` sit directly on their digits
    static ref SERIES_TRAILING_PATTERN: Regex =
        Regex::new(r"(?i)^(.+?)\s*\bS(\d+)\s*E(\d+)\s*$").unwrap();

    // ============ LOGO PATTERNS ============
    /// `http(s)://<broken host>[:port]/.../images/<id>[_small].jpg`
    static ref BROKEN_LOGO_PATTERN: Regex = Regex::new(&format!(
        r"(?i)^https?://{}(?::\d+)?/(?:[^?#]*/)?images/([^/?#]+?)(?:_small)?\.jpg(?:[?#].*)?$",
        regex::escape(BROKEN_LOGO_HOST)
    ))
    .unwrap();
}

/// Title and logo heuristics applied while building entries
pub struct ContentClassifier;

impl ContentClassifier {
    /// Extract series name, season and episode from a display name.
    ///
    /// Only a trailing `S<digits> E<digits>` marker counts; anything else is
    /// a standalone channel or movie.
    pub fn extract_series_info(name: &str) -> Option<ExtractedSeriesInfo> {
        let caps = SERIES_TRAILING_PATTERN.captures(name.trim())?;

        let series_name = caps.get(1)?.as_str().trim();
        if series_name.is_empty() {
            return None;
        }

        let season = caps.get(2)?.as_str().parse().ok()?;
        let episode = caps.get(3)?.as_str().parse().ok()?;

        Some(ExtractedSeriesInfo {
            series_name: series_name.to_string(),
            season,
            episode,
        })
    }

    /// Translate logos on the broken provider host to the TMDB mirror.
    /// Anything that does not match is returned unchanged.
    pub fn rewrite_logo_url(logo: &str) -> String {
        match BROKEN_LOGO_PATTERN.captures(logo) {
            Some(caps) => match caps.get(1) {
                Some(id) => format!("{}/{}.jpg", TMDB_IMAGE_BASE, id.as_str()),
                None => logo.to_string(),
            },
            None => logo.to_string(),
        }
    }
}
