//! Read-only adapters over the content catalog and channel registry
//!
//! The scheduler consumes three documents maintained elsewhere:
//! `metadata.json` (content items), `series.json` (series registry) and
//! `channels.json` (channel definitions). A [`CatalogProvider`] loads
//! them into an immutable [`CatalogSnapshot`] at the start of a
//! generation pass, so every query during a build sees one consistent
//! view of the library.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{
    Channel, ChannelId, ContentId, ContentItem, ContentKind, ProgrammingZone, SeriesId, SeriesInfo,
    ZoneAffinity,
};

/// Catalog document file names, relative to the content directory.
pub const METADATA_FILE: &str = "metadata.json";
pub const SERIES_FILE: &str = "series.json";
pub const CHANNELS_FILE: &str = "channels.json";

/// Catalog-specific errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog document could not be read
    #[error("Catalog document unreadable: {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A catalog document failed to parse
    #[error("Catalog document corrupt: {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Content id not present in the catalog
    #[error("Unknown content id '{id}'")]
    UnknownContent { id: ContentId },
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable view of the catalog taken at the start of a generation pass
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    content: BTreeMap<ContentId, ContentItem>,
    series: BTreeMap<SeriesId, SeriesInfo>,
    channels: BTreeMap<ChannelId, Channel>,
}

impl CatalogSnapshot {
    /// Build a snapshot from already-loaded documents
    pub fn new(
        mut content: BTreeMap<ContentId, ContentItem>,
        series: BTreeMap<SeriesId, SeriesInfo>,
        mut channels: BTreeMap<ChannelId, Channel>,
    ) -> Self {
        // Keys are authoritative for ids
        for (id, item) in content.iter_mut() {
            item.id = id.clone();
        }
        for (id, channel) in channels.iter_mut() {
            channel.id = id.clone();
        }
        Self {
            content,
            series,
            channels,
        }
    }

    /// All channels, in id order
    pub fn list_channels(&self) -> Vec<&Channel> {
        self.channels.values().collect()
    }

    /// Look up a channel by id
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    /// Series filter for a channel, if it is a broadcast-mode channel
    pub fn series_filter(&self, channel_id: &str) -> Option<&[SeriesId]> {
        self.channels
            .get(channel_id)
            .and_then(|c| c.series_filter.as_deref())
    }

    /// All known series ids
    pub fn list_series(&self) -> Vec<&SeriesId> {
        self.series.keys().collect()
    }

    /// Time-of-day affinity for a series (`Any` when unregistered)
    pub fn series_affinity(&self, series_id: &str) -> ZoneAffinity {
        self.series
            .get(series_id)
            .map(|s| s.time_of_day)
            .unwrap_or_default()
    }

    /// Episodes of a series in strict (season, episode) order
    pub fn series_episodes(&self, series_id: &str) -> Vec<&ContentItem> {
        let mut episodes: Vec<&ContentItem> = self
            .content
            .values()
            .filter(|c| {
                c.kind == ContentKind::Episode
                    && c.series.as_deref() == Some(series_id)
                    && c.sequence().is_some()
            })
            .collect();
        episodes.sort_by_key(|c| c.sequence());
        episodes
    }

    /// Duration of a content item in seconds
    pub fn duration(&self, content_id: &str) -> CatalogResult<u32> {
        self.content
            .get(content_id)
            .map(|c| c.duration_secs)
            .ok_or_else(|| CatalogError::UnknownContent {
                id: content_id.to_string(),
            })
    }

    /// Commercial pool, in id order
    pub fn list_commercials(&self) -> Vec<&ContentItem> {
        self.content
            .values()
            .filter(|c| c.kind == ContentKind::Commercial && c.duration_secs > 0)
            .collect()
    }

    /// Movie pool, in id order
    pub fn list_movies(&self) -> Vec<&ContentItem> {
        self.content
            .values()
            .filter(|c| c.kind == ContentKind::Movie && c.duration_secs > 0)
            .collect()
    }

    /// Series of a broadcast channel that may air in the given zone
    pub fn eligible_series(&self, channel: &Channel, zone: ProgrammingZone) -> Vec<SeriesId> {
        let Some(filter) = channel.series_filter.as_ref() else {
            return Vec::new();
        };
        filter
            .iter()
            .filter(|id| self.series_affinity(id).admits(zone))
            .filter(|id| !self.series_episodes(id).is_empty())
            .cloned()
            .collect()
    }

    /// Pooled titles available to an unrestricted channel
    pub fn pool_for_channel(&self, channel: &Channel) -> Vec<&ContentItem> {
        self.content
            .values()
            .filter(|c| c.is_title() && c.duration_secs > 0)
            .filter(|c| match channel.category_filter {
                Some(kind) => c.kind == kind,
                None => true,
            })
            .filter(|c| {
                channel.tag_filter.is_empty()
                    || c.tags.iter().any(|t| channel.tag_filter.contains(t))
            })
            .collect()
    }

    /// Whether there is anything at all worth scheduling
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Source of catalog snapshots
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Load a fresh snapshot of the catalog documents
    async fn load(&self) -> CatalogResult<CatalogSnapshot>;
}

/// Catalog provider reading the JSON documents from a content directory
#[derive(Debug, Clone)]
pub struct FileCatalog {
    content_dir: PathBuf,
}

impl FileCatalog {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
        }
    }

    async fn read_doc<T: DeserializeOwned + Default>(&self, name: &str) -> CatalogResult<T> {
        let path = self.content_dir.join(name);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Missing registry documents read as empty, not as failure
                return Ok(T::default());
            }
            Err(err) => {
                return Err(CatalogError::Unavailable { path, source: err });
            }
        };
        serde_json::from_str(&raw).map_err(|err| CatalogError::Corrupt {
            path,
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl CatalogProvider for FileCatalog {
    async fn load(&self) -> CatalogResult<CatalogSnapshot> {
        let content: BTreeMap<ContentId, ContentItem> = self.read_doc(METADATA_FILE).await?;
        let series: BTreeMap<SeriesId, SeriesInfo> = self.read_doc(SERIES_FILE).await?;
        let channels: BTreeMap<ChannelId, Channel> = self.read_doc(CHANNELS_FILE).await?;

        tracing::debug!(
            content = content.len(),
            series = series.len(),
            channels = channels.len(),
            dir = %self.content_dir.display(),
            "Catalog snapshot loaded"
        );

        Ok(CatalogSnapshot::new(content, series, channels))
    }
}

/// In-memory provider handing out a fixed snapshot, for tests
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    snapshot: CatalogSnapshot,
}

impl StaticCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn load(&self) -> CatalogResult<CatalogSnapshot> {
        Ok(self.snapshot.clone())
    }
}
