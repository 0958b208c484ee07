//! Core data structures for the programming grid
//!
//! These types mirror the catalog documents the scheduler consumes:
//! content metadata, series registry entries, and channel definitions.
//! The scheduler never mutates them during a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a piece of content (episode, movie, commercial).
pub type ContentId = String;

/// Identifier of a channel.
pub type ChannelId = String;

/// Identifier of a series.
pub type SeriesId = String;

// ============================================================================
// Content
// ============================================================================

/// Kind of a catalog content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Episode of a series
    Episode,
    /// Standalone movie
    Movie,
    /// Commercial spot
    Commercial,
    /// System content (test pattern, filler)
    System,
}

impl ContentKind {
    /// Get all kinds
    pub fn all() -> Vec<Self> {
        vec![Self::Episode, Self::Movie, Self::Commercial, Self::System]
    }

    /// Get kind ID as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Episode => "episode",
            Self::Movie => "movie",
            Self::Commercial => "commercial",
            Self::System => "system",
        }
    }

    /// Parse from string
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "episode" | "tv_episode" => Some(Self::Episode),
            "movie" | "film" => Some(Self::Movie),
            "commercial" | "ad" => Some(Self::Commercial),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A single catalog content item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Content identifier (also the key in the metadata document)
    #[serde(default)]
    pub id: ContentId,

    /// Display title
    pub title: String,

    /// Content kind
    pub kind: ContentKind,

    /// Parent series, for episodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<SeriesId>,

    /// Season number within the series (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,

    /// Episode number within the season (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,

    /// Duration in seconds
    pub duration_secs: u32,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContentItem {
    /// Ordering key within a series, if this is an episode
    pub fn sequence(&self) -> Option<(u32, u32)> {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }

    /// Whether this item can open a programming block
    pub fn is_title(&self) -> bool {
        matches!(self.kind, ContentKind::Episode | ContentKind::Movie)
    }
}

// ============================================================================
// Programming zones
// ============================================================================

/// A named time-of-day band used to bias which content may air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgrammingZone {
    /// 04:00-07:00
    EarlyMorning,
    /// 07:00-12:00
    LateMorning,
    /// 12:00-17:00
    Afternoon,
    /// 17:00-21:00
    Evening,
    /// 21:00-03:00
    Night,
}

impl ProgrammingZone {
    /// Get all zones in broadcast-day order
    pub fn all() -> Vec<Self> {
        vec![
            Self::EarlyMorning,
            Self::LateMorning,
            Self::Afternoon,
            Self::Evening,
            Self::Night,
        ]
    }

    /// Get zone ID as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::EarlyMorning => "early_morning",
            Self::LateMorning => "late_morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    /// Parse from string
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "early_morning" => Some(Self::EarlyMorning),
            "late_morning" => Some(Self::LateMorning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            "night" => Some(Self::Night),
            _ => None,
        }
    }

    /// Zone covering a wall-clock hour (0-23)
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            4..=6 => Self::EarlyMorning,
            7..=11 => Self::LateMorning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }
}

impl fmt::Display for ProgrammingZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Time-of-day affinity of a series: one zone, or any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneAffinity {
    EarlyMorning,
    LateMorning,
    Afternoon,
    Evening,
    Night,
    #[default]
    Any,
}

impl ZoneAffinity {
    /// Whether a series with this affinity may air in the given zone
    pub fn admits(&self, zone: ProgrammingZone) -> bool {
        match self {
            Self::Any => true,
            Self::EarlyMorning => zone == ProgrammingZone::EarlyMorning,
            Self::LateMorning => zone == ProgrammingZone::LateMorning,
            Self::Afternoon => zone == ProgrammingZone::Afternoon,
            Self::Evening => zone == ProgrammingZone::Evening,
            Self::Night => zone == ProgrammingZone::Night,
        }
    }
}

/// Series registry entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// Time-of-day affinity; `any` series may air in every zone
    #[serde(default)]
    pub time_of_day: ZoneAffinity,
}

// ============================================================================
// Channels
// ============================================================================

/// Channel definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier (also the key in the channels document)
    #[serde(default)]
    pub id: ChannelId,

    /// Display name
    pub name: String,

    /// Restrict the channel to these series (broadcast-mode scheduling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_filter: Option<Vec<SeriesId>>,

    /// Restrict pooled selection to a content kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_filter: Option<ContentKind>,

    /// Restrict pooled selection to content carrying any of these tags
    #[serde(default)]
    pub tag_filter: Vec<String>,
}

impl Channel {
    /// Whether weekly slot assignment applies to this channel
    pub fn is_broadcast(&self) -> bool {
        self.series_filter
            .as_ref()
            .map(|f| !f.is_empty())
            .unwrap_or(false)
    }
}

// ============================================================================
// Tests
// ============================================================================
