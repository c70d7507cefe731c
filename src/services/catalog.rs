use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{Category, ChannelEntry, GroupingMode, Season, Series};
use crate::services::m3u_parser;

/// Season assumed for an episode without a season marker
const DEFAULT_SEASON: u32 = 1;

/// Filter context of a catalog view. Both parts are optional and conjunctive.
#[derive(Debug, Default, Clone)]
pub struct ChannelFilter {
    category: Option<String>,
    search: Option<String>,
}

impl ChannelFilter {
    pub fn new(category: Option<&str>, search: Option<&str>) -> Self {
        Self {
            category: category
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            search: search
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
        }
    }

    pub fn matches(&self, entry: &ChannelEntry) -> bool {
        if let Some(category) = &self.category {
            if entry.group_name != *category {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !entry.display_name.to_lowercase().contains(search.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Categories with entry counts, ordered by name
pub fn list_categories(entries: &[ChannelEntry]) -> Vec<Category> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.group_name.as_str()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(name, count)| Category {
            name: name.to_string(),
            count,
        })
        .collect()
}

/// Entries visible under `filter`, in playlist order
pub fn query_channels<'a>(entries: &'a [ChannelEntry], filter: &ChannelFilter) -> Vec<&'a ChannelEntry> {
    entries.iter().filter(|e| filter.matches(e)).collect()
}

/// `Series` when strictly more than half of the visible entries are episodes
pub fn grouping_mode(entries: &[ChannelEntry], filter: &ChannelFilter) -> GroupingMode {
    let (visible, with_series) = entries
        .iter()
        .filter(|e| filter.matches(e))
        .fold((0usize, 0usize), |(visible, with_series), e| {
            (visible + 1, with_series + usize::from(e.series_name.is_some()))
        });

    if with_series * 2 > visible {
        GroupingMode::Series
    } else {
        GroupingMode::Flat
    }
}

/// Total episode order: (season, episode) with unset as 0, then name and URL
fn episode_order(a: &ChannelEntry, b: &ChannelEntry) -> Ordering {
    let key = |e: &ChannelEntry| (e.season_number.unwrap_or(0), e.episode_number.unwrap_or(0));
    key(a)
        .cmp(&key(b))
        .then_with(|| a.display_name.cmp(&b.display_name))
        .then_with(|| a.playback_url.cmp(&b.playback_url))
}

/// Group episodes of `entries` into series, ordered by series name.
/// Entries without a series name are skipped.
pub fn list_series<'a, I>(entries: I) -> Vec<Series>
where
    I: IntoIterator<Item = &'a ChannelEntry>,
{
    let mut grouped: HashMap<&str, Vec<&ChannelEntry>> = HashMap::new();
    for entry in entries {
        if let Some(name) = entry.series_name.as_deref() {
            grouped.entry(name).or_default().push(entry);
        }
    }

    let mut series: Vec<Series> = grouped
        .into_iter()
        .map(|(name, episodes)| build_series(name, episodes))
        .collect();
    series.sort_by(|a, b| a.name.cmp(&b.name));
    series
}

fn build_series(name: &str, episodes: Vec<&ChannelEntry>) -> Series {
    // logo comes from the first episode seen, before sorting
    let logo = episodes
        .first()
        .map(|e| e.logo_url.clone())
        .unwrap_or_default();

    let distinct_seasons: BTreeSet<u32> = episodes
        .iter()
        .map(|e| e.season_number.unwrap_or(DEFAULT_SEASON))
        .collect();

    let mut sorted: Vec<ChannelEntry> = episodes.into_iter().cloned().collect();
    sorted.sort_by(episode_order);

    let mut seasons: BTreeMap<u32, Vec<ChannelEntry>> = BTreeMap::new();
    for episode in &sorted {
        seasons
            .entry(episode.season_number.unwrap_or(DEFAULT_SEASON))
            .or_default()
            .push(episode.clone());
    }

    Series {
        name: name.to_string(),
        logo,
        season_count: distinct_seasons.len(),
        episode_count: sorted.len(),
        episodes: sorted,
        seasons: seasons
            .into_iter()
            .map(|(season_number, episodes)| Season {
                season_number,
                episodes,
            })
            .collect(),
    }
}

/// Queryable view over one parse result
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<ChannelEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<ChannelEntry>) -> Self {
        Self { entries }
    }

    pub fn from_playlist(text: &str) -> Self {
        Self::new(m3u_parser::parse(text))
    }

    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }

    pub fn list_categories(&self) -> Vec<Category> {
        list_categories(&self.entries)
    }

    pub fn query_channels(&self, filter: &ChannelFilter) -> Vec<&ChannelEntry> {
        query_channels(&self.entries, filter)
    }

    pub fn grouping_mode(&self, filter: &ChannelFilter) -> GroupingMode {
        grouping_mode(&self.entries, filter)
    }

    pub fn list_series(&self, filter: &ChannelFilter) -> Vec<Series> {
        list_series(self.query_channels(filter))
    }
}

struct CatalogSnapshot {
    source: Arc<str>,
    catalog: Arc<Catalog>,
}

/// Memoizes the catalog built from the currently cached playlist text.
/// Rebuilt only when the cache hands out different text.
#[derive(Default)]
pub struct CatalogStore {
    current: RwLock<Option<CatalogSnapshot>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn catalog_for(&self, source: Arc<str>) -> Arc<Catalog> {
        {
            let current = self.current.read().await;
            if let Some(snapshot) = current.as_ref() {
                if Arc::ptr_eq(&snapshot.source, &source) {
                    return snapshot.catalog.clone();
                }
            }
        }

        let mut current = self.current.write().await;
        // another request may have rebuilt it while we waited
        if let Some(snapshot) = current.as_ref() {
            if Arc::ptr_eq(&snapshot.source, &source) {
                return snapshot.catalog.clone();
            }
        }

        let catalog = Arc::new(Catalog::from_playlist(&source));
        tracing::info!(entries = catalog.entries().len(), "catalog rebuilt");

        *current = Some(CatalogSnapshot {
            source,
            catalog: catalog.clone(),
        });
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, group: &str) -> ChannelEntry {
        ChannelEntry {
            id: name.to_string(),
            display_name: name.to_string(),
            group_name: group.to_string(),
            logo_url: String::new(),
            playback_url: format!("http://provider.tv/{}", name.replace(' ', "_")),
            series_name: None,
            season_number: None,
            episode_number: None,
        }
    }

    fn episode(series: &str, season: Option<u32>, ep: Option<u32>, logo: &str) -> ChannelEntry {
        let name = format!("{} S{:02} E{:02}", series, season.unwrap_or(0), ep.unwrap_or(0));
        ChannelEntry {
            logo_url: logo.to_string(),
            series_name: Some(series.to_string()),
            season_number: season,
            episode_number: ep,
            ..entry(&name, "Series")
        }
    }

    #[test]
    fn test_list_categories_sorted_with_counts() {
        let entries = vec![
            entry("b", "Sports"),
            entry("a", "Movies"),
            entry("c", "Sports"),
            entry("d", "Kids"),
        ];
        let categories = list_categories(&entries);
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kids", "Movies", "Sports"]);
        assert_eq!(categories[2].count, 2);
    }

    #[test]
    fn test_query_channels_is_conjunctive() {
        let entries = vec![
            entry("ESPN HD", "Sports"),
            entry("ESPN 2", "Sports"),
            entry("Espn Docs", "Docs"),
            entry("Fox Sports", "Sports"),
        ];

        let filter = ChannelFilter::new(Some("Sports"), Some("espn"));
        let names: Vec<_> = query_channels(&entries, &filter)
            .iter()
            .map(|e| e.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["ESPN HD", "ESPN 2"]);

        assert_eq!(query_channels(&entries, &ChannelFilter::new(None, Some("ESPN"))).len(), 3);
        assert_eq!(query_channels(&entries, &ChannelFilter::new(Some(""), Some(""))).len(), 4);
        assert!(query_channels(&entries, &ChannelFilter::new(Some("sports"), None)).is_empty());
    }

    #[test]
    fn test_search_is_not_trimmed() {
        let entries = vec![entry("Globo HD", "TV"), entry("HDTV Test", "TV")];

        let names: Vec<_> = query_channels(&entries, &ChannelFilter::new(None, Some(" HD")))
            .iter()
            .map(|e| e.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Globo HD"]);
        assert_eq!(query_channels(&entries, &ChannelFilter::new(None, Some("hd"))).len(), 2);
    }

    #[test]
    fn test_grouping_mode_threshold_is_strict() {
        let mut sixty = vec![entry("m1", "Mix"), entry("m2", "Mix")];
        sixty.extend((1..=3).map(|i| episode("Lost", Some(1), Some(i), "")));
        assert_eq!(grouping_mode(&sixty, &ChannelFilter::default()), GroupingMode::Series);

        let mut fifty = vec![entry("m1", "Mix"), entry("m2", "Mix")];
        fifty.extend((1..=2).map(|i| episode("Lost", Some(1), Some(i), "")));
        assert_eq!(grouping_mode(&fifty, &ChannelFilter::default()), GroupingMode::Flat);

        assert_eq!(grouping_mode(&[], &ChannelFilter::default()), GroupingMode::Flat);
    }

    #[test]
    fn test_grouping_mode_follows_filter_context() {
        let mut entries: Vec<ChannelEntry> =
            (1..=4).map(|i| episode("Lost", Some(1), Some(i), "")).collect();
        entries.push(entry("Lost Movie", "Series"));

        let category = ChannelFilter::new(Some("Series"), None);
        assert_eq!(grouping_mode(&entries, &category), GroupingMode::Series);

        let search = ChannelFilter::new(Some("Series"), Some("movie"));
        assert_eq!(grouping_mode(&entries, &search), GroupingMode::Flat);
    }

    #[test]
    fn test_list_series_orders_episodes() {
        let entries = vec![
            episode("Dark", Some(2), Some(1), "logo-first"),
            episode("Dark", Some(1), Some(2), "logo-second"),
            episode("Dark", None, Some(5), ""),
            episode("Dark", Some(1), Some(1), ""),
            episode("Alf", Some(1), None, "alf"),
            entry("Not a series", "Movies"),
        ];

        let series = list_series(&entries);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "Alf");

        let dark = &series[1];
        assert_eq!(dark.logo, "logo-first");
        assert_eq!(dark.episode_count, 4);
        // absent season counts as season 1
        assert_eq!(dark.season_count, 2);

        let order: Vec<_> = dark
            .episodes
            .iter()
            .map(|e| (e.season_number.unwrap_or(0), e.episode_number.unwrap_or(0)))
            .collect();
        assert_eq!(order, vec![(0, 5), (1, 1), (1, 2), (2, 1)]);

        assert_eq!(dark.seasons.len(), 2);
        assert_eq!(dark.seasons[0].season_number, 1);
        assert_eq!(dark.seasons[0].episodes.len(), 3);
        assert_eq!(dark.seasons[1].season_number, 2);
    }

    #[test]
    fn test_list_series_is_input_order_independent() {
        let entries = vec![
            episode("Lost", Some(3), Some(1), ""),
            episode("Lost", Some(1), Some(10), ""),
            episode("Lost", Some(1), Some(2), ""),
            episode("Lost", None, None, ""),
            episode("Lost", Some(2), Some(7), ""),
            episode("Lost", Some(1), Some(2), ""),
        ];
        let mut shuffled = entries.clone();
        shuffled.reverse();
        shuffled.swap(1, 4);

        let a = list_series(&entries);
        let b = list_series(&shuffled);
        assert_eq!(a[0].episodes, b[0].episodes);
    }

    #[test]
    fn test_catalog_from_playlist() {
        let text = "#EXTINF:-1 group-title=\"Series\",Dark S01 E01\nhttp://a\n#EXTINF:-1 group-title=\"Series\",Dark S01 E02\nhttp://b\n#EXTINF:-1 group-title=\"TV\",Globo\nhttp://c\n";
        let catalog = Catalog::from_playlist(text);

        assert_eq!(catalog.list_categories().len(), 2);
        assert_eq!(catalog.grouping_mode(&ChannelFilter::default()), GroupingMode::Series);
        assert_eq!(
            catalog.grouping_mode(&ChannelFilter::new(Some("TV"), None)),
            GroupingMode::Flat
        );
        let series = catalog.list_series(&ChannelFilter::new(Some("Series"), None));
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].episode_count, 2);
    }

    #[tokio::test]
    async fn test_catalog_store_reuses_same_source() {
        let store = CatalogStore::new();
        let text: Arc<str> = Arc::from("http://a\nhttp://b\n");

        let first = store.catalog_for(text.clone()).await;
        let second = store.catalog_for(text.clone()).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.entries().len(), 2);

        let reloaded: Arc<str> = Arc::from("http://c\n");
        let third = store.catalog_for(reloaded).await;
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.entries().len(), 1);
    }
}
