//! Episode cursor store
//!
//! For every (channel, series) pair the store remembers the last aired
//! (season, episode). `next_episode` peeks at the episode that should
//! air next; `advance` is the only mutation path and must be called
//! exactly once per scheduled airing. Rebuilding an already-built day
//! restores the channel's cursors to their pre-build baseline first, so
//! a rebuild never double-advances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{ChannelId, ContentItem, SeriesId};

/// Last-aired position within a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPos {
    pub season: u32,
    pub episode: u32,
}

impl CursorPos {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for CursorPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Cursors of a single channel, keyed by series
pub type ChannelCursors = BTreeMap<SeriesId, CursorPos>;

/// Persistent cursor store, keyed by channel then series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CursorStore {
    channels: BTreeMap<ChannelId, ChannelCursors>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor for a (channel, series) pair
    pub fn get(&self, channel: &str, series: &str) -> Option<CursorPos> {
        self.channels
            .get(channel)
            .and_then(|c| c.get(series))
            .copied()
    }

    /// Episode that should air next for a (channel, series) pair.
    ///
    /// `episodes` must be the series' episodes in strict (season,
    /// episode) order. With no cursor the first episode is returned;
    /// after the final episode the series wraps to the first. A cursor
    /// pointing at an episode no longer in the catalog resets to the
    /// first episode instead of failing the build.
    pub fn next_episode<'a>(
        &self,
        channel: &str,
        series: &str,
        episodes: &[&'a ContentItem],
    ) -> Option<&'a ContentItem> {
        let first = *episodes.first()?;

        let Some(pos) = self.get(channel, series) else {
            return Some(first);
        };

        match episodes
            .iter()
            .position(|e| e.sequence() == Some((pos.season, pos.episode)))
        {
            Some(index) => Some(episodes[(index + 1) % episodes.len()]),
            None => {
                tracing::warn!(
                    channel,
                    series,
                    cursor = %pos,
                    "Cursor points at a missing episode, resetting to first"
                );
                Some(first)
            }
        }
    }

    /// Record an aired episode as the new cursor position
    pub fn advance(&mut self, channel: &str, series: &str, aired: CursorPos) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(series.to_string(), aired);
    }

    /// Copy of a channel's cursors, used as the pre-build baseline
    pub fn snapshot_channel(&self, channel: &str) -> ChannelCursors {
        self.channels.get(channel).cloned().unwrap_or_default()
    }

    /// Replace a channel's cursors wholesale with a saved baseline
    pub fn restore_channel(&mut self, channel: &str, baseline: ChannelCursors) {
        if baseline.is_empty() {
            self.channels.remove(channel);
        } else {
            self.channels.insert(channel.to_string(), baseline);
        }
    }

    /// Number of channels with any cursor
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
