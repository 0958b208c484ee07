//! Schedule cache and lookup engine
//!
//! The cache holds read-optimized indexes of the daily schedule for the
//! most recent broadcast dates. Playback lookups resolve against an
//! immutable snapshot behind an `Arc`, so a swap during regeneration is
//! atomic from the caller's point of view: a lookup sees either the old
//! or the new schedule, never a mix.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::daily::{DailySchedule, ScheduleEntry};
use super::error::{SchedulerError, SchedulerResult};
use super::zone::{BroadcastInstant, TEST_PATTERN_END, TEST_PATTERN_ID};
use crate::models::{ChannelId, ContentId};

/// Broadcast dates the cache retains (current plus the previous one, so
/// queries just before the 03:00 rollover still resolve).
const RETAINED_DAYS: usize = 2;

/// Result of a playback lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAt {
    /// Content on air
    pub content_id: ContentId,

    /// Seek position within the content, in seconds
    pub offset_sec: u32,

    /// Whether a commercial break is on air
    pub is_commercial: bool,
}

// ============================================================================
// Indexes
// ============================================================================

/// One channel's entries for a day, ordered by start offset
#[derive(Debug, Clone, Default)]
struct ChannelIndex {
    entries: Vec<ScheduleEntry>,
}

impl ChannelIndex {
    fn new(mut entries: Vec<ScheduleEntry>) -> Self {
        entries.sort_by_key(|e| e.start_offset_sec);
        Self { entries }
    }

    /// Entry covering a day offset
    fn find(&self, offset_sec: u32) -> Option<&ScheduleEntry> {
        let idx = self
            .entries
            .partition_point(|e| e.start_offset_sec <= offset_sec);
        if idx == 0 {
            return None;
        }
        let entry = &self.entries[idx - 1];
        entry.covers(offset_sec).then_some(entry)
    }
}

#[derive(Debug, Clone, Default)]
struct DayIndex {
    channels: BTreeMap<ChannelId, ChannelIndex>,
}

#[derive(Debug, Clone, Default)]
struct CacheInner {
    days: BTreeMap<NaiveDate, DayIndex>,
}

impl CacheInner {
    fn prune(&mut self) {
        while self.days.len() > RETAINED_DAYS {
            let oldest = *self.days.keys().next().expect("non-empty");
            self.days.remove(&oldest);
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Cache state summary
#[derive(Debug, Clone)]
pub struct CacheStatus {
    /// Broadcast dates currently indexed
    pub dates: Vec<NaiveDate>,

    /// Channels indexed for the newest date
    pub channels: usize,
}

/// Read-optimized schedule cache with atomic snapshot swaps
pub struct ScheduleCache {
    inner: RwLock<Arc<CacheInner>>,
}

impl ScheduleCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(CacheInner::default())),
        }
    }

    /// Index a full daily schedule, replacing that date's data and
    /// pruning dates beyond the retention window
    pub async fn install(&self, schedule: &DailySchedule) {
        let mut day = DayIndex::default();
        for (channel, channel_day) in &schedule.channels {
            day.channels.insert(
                channel.clone(),
                ChannelIndex::new(channel_day.entries.clone()),
            );
        }

        let mut next = CacheInner::clone(&*self.inner.read().await);
        next.days.insert(schedule.schedule_date, day);
        next.prune();

        *self.inner.write().await = Arc::new(next);
        tracing::debug!(date = %schedule.schedule_date, "Schedule cache installed");
    }

    /// Replace a single channel's entries for a date (manual rebuild)
    pub async fn install_channel(
        &self,
        date: NaiveDate,
        channel: impl Into<ChannelId>,
        entries: Vec<ScheduleEntry>,
    ) {
        let mut next = CacheInner::clone(&*self.inner.read().await);
        next.days
            .entry(date)
            .or_default()
            .channels
            .insert(channel.into(), ChannelIndex::new(entries));
        next.prune();

        *self.inner.write().await = Arc::new(next);
    }

    /// Resolve what is on air for a channel at a broadcast instant.
    ///
    /// The test pattern window is guaranteed: any query in 03:00-04:00
    /// with no covering entry resolves to the test pattern. Any other
    /// uncovered second is an explicit no-program error.
    pub async fn lookup(&self, channel: &str, at: BroadcastInstant) -> SchedulerResult<ProgramAt> {
        let snapshot = Arc::clone(&*self.inner.read().await);

        let entry = snapshot
            .days
            .get(&at.date)
            .and_then(|day| day.channels.get(channel))
            .and_then(|index| index.find(at.offset_sec));

        if let Some(entry) = entry {
            return Ok(ProgramAt {
                content_id: entry.content_id.clone(),
                offset_sec: entry.content_offset_sec + (at.offset_sec - entry.start_offset_sec),
                is_commercial: entry.is_commercial,
            });
        }

        if at.offset_sec < TEST_PATTERN_END {
            return Ok(ProgramAt {
                content_id: TEST_PATTERN_ID.to_string(),
                offset_sec: at.offset_sec,
                is_commercial: false,
            });
        }

        Err(SchedulerError::no_program(channel, at.offset_sec))
    }

    /// Drop all indexed data
    pub async fn clear(&self) {
        *self.inner.write().await = Arc::new(CacheInner::default());
    }

    /// Current cache state (never blocks on a build in progress)
    pub async fn status(&self) -> CacheStatus {
        let snapshot = Arc::clone(&*self.inner.read().await);
        let dates: Vec<NaiveDate> = snapshot.days.keys().copied().collect();
        let channels = snapshot
            .days
            .values()
            .next_back()
            .map(|day| day.channels.len())
            .unwrap_or(0);
        CacheStatus { dates, channels }
    }
}

impl Default for ScheduleCache {
    fn default() -> Self {
        Self::new()
    }
}
