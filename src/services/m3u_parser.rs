use lazy_static::lazy_static;
use regex::Regex;

use crate::models::ChannelEntry;
use crate::services::classifier::ContentClassifier;

/// Directive that starts a metadata line
const EXTINF_PREFIX: &str = "#EXTINF";
/// Legacy group directive, used when `group-title` is missing
const EXTGRP_PREFIX: &str = "#EXTGRP:";

pub const DEFAULT_NAME: &str = "Unknown Channel";
pub const DEFAULT_GROUP: &str = "Uncategorized";

lazy_static! {
    static ref GROUP_TITLE_REGEX: Regex = Regex::new(r#"group-title="([^"]*)""#).unwrap();
    static ref TVG_LOGO_REGEX: Regex = Regex::new(r#"tvg-logo="([^"]*)""#).unwrap();
    static ref TVG_ID_REGEX: Regex = Regex::new(r#"tvg-id="([^"]*)""#).unwrap();
}

/// Capture a quoted attribute; empty values count as missing
fn extract_attribute(regex: &Regex, line: &str) -> Option<String> {
    regex
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn extract_group(line: &str) -> Option<String> {
    extract_attribute(&GROUP_TITLE_REGEX, line)
}

pub fn extract_logo(line: &str) -> Option<String> {
    extract_attribute(&TVG_LOGO_REGEX, line)
}

pub fn extract_tvg_id(line: &str) -> Option<String> {
    extract_attribute(&TVG_ID_REGEX, line)
}

/// Display name: everything after the last comma of the metadata line
pub fn extract_display_name(line: &str) -> Option<String> {
    line.rsplit_once(',')
        .map(|(_, name)| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Metadata collected since the last materialized entry
#[derive(Debug, Default)]
struct PendingEntry {
    has_metadata: bool,
    name: Option<String>,
    group: Option<String>,
    group_hint: Option<String>,
    logo: Option<String>,
    tvg_id: Option<String>,
}

impl PendingEntry {
    fn apply_extinf(&mut self, line: &str) {
        self.has_metadata = true;
        self.name = extract_display_name(line);
        self.group = extract_group(line);
        self.logo = extract_logo(line);
        self.tvg_id = extract_tvg_id(line);
    }

    fn apply_extgrp(&mut self, line: &str) {
        let value = line[EXTGRP_PREFIX.len()..].trim();
        if !value.is_empty() {
            self.group_hint = Some(value.to_string());
        }
    }

    /// Build the entry for `url`, applying defaults for everything missing
    fn materialize(self, url: &str, index: usize) -> ChannelEntry {
        let display_name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());
        let series = ContentClassifier::extract_series_info(&display_name);

        ChannelEntry {
            id: self.tvg_id.unwrap_or_else(|| format!("ch-{}", index)),
            group_name: self
                .group
                .or(self.group_hint)
                .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            logo_url: ContentClassifier::rewrite_logo_url(self.logo.as_deref().unwrap_or("")),
            playback_url: url.to_string(),
            series_name: series.as_ref().map(|s| s.series_name.clone()),
            season_number: series.as_ref().map(|s| s.season),
            episode_number: series.as_ref().map(|s| s.episode),
            display_name,
        }
    }
}

/// Accumulator threaded through the fold over playlist lines
#[derive(Debug, Default)]
struct ParseState {
    pending: PendingEntry,
    entries: Vec<ChannelEntry>,
    orphans: usize,
}

impl ParseState {
    fn step(mut self, raw_line: &str) -> Self {
        let line = raw_line.trim_start_matches('\u{feff}').trim();

        if line.is_empty() {
            return self;
        }

        if line.starts_with(EXTINF_PREFIX) {
            self.pending.apply_extinf(line);
        } else if line.starts_with(EXTGRP_PREFIX) {
            self.pending.apply_extgrp(line);
        } else if line.starts_with('#') {
            // #EXTM3U, #EXTVLCOPT, plain comments
        } else {
            let pending = std::mem::take(&mut self.pending);
            if !pending.has_metadata {
                self.orphans += 1;
            }
            let index = self.entries.len();
            self.entries.push(pending.materialize(line, index));
        }

        self
    }
}

/// Parse playlist text into entries, in source order.
///
/// Never fails: missing attributes fall back to defaults and a playback line
/// without metadata still yields an entry.
pub fn parse(text: &str) -> Vec<ChannelEntry> {
    let state = text.lines().fold(ParseState::default(), ParseState::step);

    tracing::debug!(
        entries = state.entries.len(),
        orphans = state.orphans,
        "playlist parsed"
    );

    state.entries
}
