//! Common test utilities

use pampero::catalog::CatalogSnapshot;
use pampero::models::{
    Channel, ChannelId, ContentId, ContentItem, ContentKind, SeriesId, SeriesInfo, ZoneAffinity,
};
use std::collections::BTreeMap;

/// Broadcast time zone used across the integration tests
#[allow(dead_code)]
pub const TEST_TZ: &str = "America/Argentina/Buenos_Aires";

/// Create an episode content item
#[allow(dead_code)]
pub fn episode(series: &str, season: u32, number: u32, duration_secs: u32) -> ContentItem {
    ContentItem {
        id: format!("{series}_s{season:02}e{number:02}"),
        title: format!("{series} S{season:02}E{number:02}"),
        kind: ContentKind::Episode,
        series: Some(series.to_string()),
        season: Some(season),
        episode: Some(number),
        duration_secs,
        tags: vec![],
    }
}

/// Create a commercial content item
#[allow(dead_code)]
pub fn commercial(id: &str, duration_secs: u32) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: id.to_string(),
        kind: ContentKind::Commercial,
        series: None,
        season: None,
        episode: None,
        duration_secs,
        tags: vec![],
    }
}

/// Create a movie content item
#[allow(dead_code)]
pub fn movie(id: &str, duration_secs: u32) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: id.to_string(),
        kind: ContentKind::Movie,
        series: None,
        season: None,
        episode: None,
        duration_secs,
        tags: vec![],
    }
}

/// Fluent catalog fixture builder
#[derive(Default)]
pub struct CatalogBuilder {
    content: BTreeMap<ContentId, ContentItem>,
    series: BTreeMap<SeriesId, SeriesInfo>,
    channels: BTreeMap<ChannelId, Channel>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series with `count` episodes of equal duration
    pub fn series(mut self, id: &str, affinity: ZoneAffinity, count: u32, duration: u32) -> Self {
        self.series.insert(
            id.to_string(),
            SeriesInfo {
                time_of_day: affinity,
            },
        );
        for number in 1..=count {
            let ep = episode(id, 1, number, duration);
            self.content.insert(ep.id.clone(), ep);
        }
        self
    }

    /// Register `count` commercials of equal duration
    pub fn commercials(mut self, count: u32, duration: u32) -> Self {
        for n in 1..=count {
            let spot = commercial(&format!("spot_{n}"), duration);
            self.content.insert(spot.id.clone(), spot);
        }
        self
    }

    /// Register a single movie
    #[allow(dead_code)]
    pub fn movie(mut self, id: &str, duration: u32) -> Self {
        let item = movie(id, duration);
        self.content.insert(item.id.clone(), item);
        self
    }

    /// Register a broadcast-mode channel restricted to some series
    pub fn broadcast_channel(mut self, id: &str, series: &[&str]) -> Self {
        self.channels.insert(
            id.to_string(),
            Channel {
                id: String::new(),
                name: format!("Canal {id}"),
                series_filter: Some(series.iter().map(|s| s.to_string()).collect()),
                category_filter: None,
                tag_filter: vec![],
            },
        );
        self
    }

    /// Register an unrestricted (library) channel
    #[allow(dead_code)]
    pub fn library_channel(mut self, id: &str, category: Option<ContentKind>) -> Self {
        self.channels.insert(
            id.to_string(),
            Channel {
                id: String::new(),
                name: format!("Canal {id}"),
                series_filter: None,
                category_filter: category,
                tag_filter: vec![],
            },
        );
        self
    }

    pub fn build(self) -> CatalogSnapshot {
        CatalogSnapshot::new(self.content, self.series, self.channels)
    }
}
