//! Daily schedule building
//!
//! The daily builder expands one broadcast day's weekly assignments into
//! a second-by-second play list per channel. Every half-hour block gets
//! commercial breaks at its start, middle and end; content fills the two
//! gaps between them as (content, offset) slices, so a long title simply
//! carries into the following blocks and a short one is padded with
//! commercials. The test pattern hour is force-applied last,
//! unconditionally.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cursor::{ChannelCursors, CursorPos, CursorStore};
use super::selection::SelectionPolicy;
use super::weekly::{ChannelWeek, SlotSeries};
use super::zone::{
    day_of_week_index, slot_offset, BLOCK_SECS, DAY_SECS, FIRST_ASSIGNABLE_SLOT, SLOTS_PER_DAY,
    SPONSOR_FILLER_ID, TEST_PATTERN_END, TEST_PATTERN_ID,
};
use crate::catalog::CatalogSnapshot;
use crate::models::{Channel, ChannelId, ContentId, ContentItem, SeriesId};

/// Day offset (within a block) where the mid break begins.
const MID_BREAK_POINT: u32 = 900;

// ============================================================================
// Document model
// ============================================================================

/// One contiguous stretch of a single piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Start, in seconds from 03:00
    pub start_offset_sec: u32,

    /// Exclusive end, in seconds from 03:00
    pub end_offset_sec: u32,

    /// Content being aired
    pub content_id: ContentId,

    /// Offset into the content at which this stretch begins
    pub content_offset_sec: u32,

    /// Whether this stretch is part of a commercial break
    pub is_commercial: bool,
}

impl ScheduleEntry {
    /// Length of the stretch in seconds
    pub fn duration(&self) -> u32 {
        self.end_offset_sec - self.start_offset_sec
    }

    /// Whether the stretch covers a day offset
    pub fn covers(&self, offset_sec: u32) -> bool {
        self.start_offset_sec <= offset_sec && offset_sec < self.end_offset_sec
    }
}

/// One channel's play list for a broadcast day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelDay {
    /// Entries in start order, partitioning the day
    pub entries: Vec<ScheduleEntry>,

    /// Cursor values of this channel before the build; a rebuild of the
    /// same day restores these first so cursors never double-advance
    #[serde(default)]
    pub cursor_baseline: ChannelCursors,
}

/// The persisted daily schedule document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySchedule {
    /// Broadcast date this document describes
    pub schedule_date: NaiveDate,

    /// When this document was generated
    pub generated_at: DateTime<Utc>,

    /// Instant the broadcast day starts (03:00 local)
    pub valid_from: DateTime<Utc>,

    /// Instant the broadcast day ends (03:00 local, next day)
    pub valid_until: DateTime<Utc>,

    /// Per-channel play lists
    pub channels: BTreeMap<ChannelId, ChannelDay>,
}

impl DailySchedule {
    pub fn new(
        schedule_date: NaiveDate,
        generated_at: DateTime<Utc>,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            schedule_date,
            generated_at,
            valid_from,
            valid_until,
            channels: BTreeMap::new(),
        }
    }

    /// Whether this document describes the given broadcast date
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.schedule_date == date
    }

    /// A channel's play list
    pub fn channel(&self, id: &str) -> Option<&ChannelDay> {
        self.channels.get(id)
    }

    /// Replace a single channel's play list without touching the others
    pub fn set_channel(&mut self, id: impl Into<ChannelId>, day: ChannelDay) {
        self.channels.insert(id.into(), day);
    }

    /// Whether every channel's entries partition the day exactly
    pub fn is_complete(&self) -> bool {
        self.channels
            .values()
            .all(|day| is_day_partition(&day.entries))
    }
}

/// Check that entries cover every second of the day exactly once
pub fn is_day_partition(entries: &[ScheduleEntry]) -> bool {
    let Some(first) = entries.first() else {
        return false;
    };
    if first.start_offset_sec != 0 {
        return false;
    }
    let mut pos = 0u32;
    for entry in entries {
        if entry.start_offset_sec != pos || entry.end_offset_sec <= entry.start_offset_sec {
            return false;
        }
        pos = entry.end_offset_sec;
    }
    pos == DAY_SECS
}

// ============================================================================
// Block layout
// ============================================================================

/// Commercial break lengths within a block
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockLayout {
    /// Break at the block start
    pub break_start_secs: u32,

    /// Break at the block middle (offset 900)
    pub break_mid_secs: u32,

    /// Break closing the block
    pub break_end_secs: u32,
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            break_start_secs: 60,
            break_mid_secs: 120,
            break_end_secs: 60,
        }
    }
}

impl BlockLayout {
    /// Check the breaks leave room for content in both gaps
    pub fn is_sane(&self) -> bool {
        self.break_start_secs < MID_BREAK_POINT
            && MID_BREAK_POINT + self.break_mid_secs + self.break_end_secs < BLOCK_SECS
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Content currently on air, sliced across gaps and blocks
#[derive(Debug, Clone)]
struct OnAir {
    content_id: ContentId,
    offset: u32,
    remaining: u32,
}

/// Same-series run bookkeeping for the back-to-back bias
#[derive(Debug, Default)]
struct RunState {
    series: Option<SeriesId>,
    remaining: u32,
}

/// Expands weekly assignments into per-second play lists
#[derive(Debug, Clone, Default)]
pub struct DailyBuilder {
    layout: BlockLayout,
}

impl DailyBuilder {
    pub fn new(layout: BlockLayout) -> Self {
        Self { layout }
    }

    /// Build one channel's play list for a broadcast date.
    ///
    /// `week` is the channel's weekly assignment (absent for channels
    /// without a series filter). Cursors advance as episodes are
    /// scheduled; the caller is responsible for baseline handling.
    pub fn build_channel(
        &self,
        catalog: &CatalogSnapshot,
        week: Option<&ChannelWeek>,
        cursors: &mut CursorStore,
        channel: &Channel,
        date: NaiveDate,
        policy: &mut dyn SelectionPolicy,
    ) -> Vec<ScheduleEntry> {
        let day_index = day_of_week_index(date);
        let commercials = catalog.list_commercials();
        let movies = catalog.list_movies();
        let pool = catalog.pool_for_channel(channel);

        let mut entries = Vec::new();
        let mut carry: Option<OnAir> = None;
        let mut run = RunState::default();

        for slot in FIRST_ASSIGNABLE_SLOT..SLOTS_PER_DAY {
            let block_start = slot_offset(slot);

            let mut current = match carry.take() {
                Some(on_air) => Some(on_air),
                None => {
                    let assignment = week.and_then(|w| w.get(day_index, slot));
                    self.resolve_title(
                        catalog,
                        channel,
                        assignment.map(|a| &a.series),
                        &movies,
                        &pool,
                        cursors,
                        &mut run,
                        policy,
                        slot,
                    )
                }
            };

            let Some(mut on_air) = current.take() else {
                // Nothing to air: the whole block falls back to the
                // test pattern, and any series run is interrupted
                entries.push(ScheduleEntry {
                    start_offset_sec: block_start,
                    end_offset_sec: block_start + BLOCK_SECS,
                    content_id: TEST_PATTERN_ID.to_string(),
                    content_offset_sec: 0,
                    is_commercial: false,
                });
                run = RunState::default();
                continue;
            };

            carry = self.assemble_block(
                &mut entries,
                block_start,
                &mut on_air,
                &commercials,
                policy,
            );
        }

        apply_test_pattern_override(&mut entries);
        entries
    }

    /// Lay out one block: breaks at start/middle/end, content in the
    /// gaps, commercials padding whatever the content leaves open.
    /// Returns the unfinished remainder of the content, if any.
    fn assemble_block(
        &self,
        entries: &mut Vec<ScheduleEntry>,
        block_start: u32,
        on_air: &mut OnAir,
        commercials: &[&ContentItem],
        policy: &mut dyn SelectionPolicy,
    ) -> Option<OnAir> {
        let mid_start = block_start + MID_BREAK_POINT;
        let gap2_start = mid_start + self.layout.break_mid_secs;
        let gap2_end = block_start + BLOCK_SECS - self.layout.break_end_secs;
        let block_end = block_start + BLOCK_SECS;

        // Opening break
        let mut pos = self.fill_commercials(
            entries,
            block_start,
            block_start + self.layout.break_start_secs,
            commercials,
            policy,
        );

        // First gap
        pos = place_content(entries, pos, mid_start, on_air);
        pos = self.fill_commercials(entries, pos, mid_start, commercials, policy);

        // Mid break
        pos = self.fill_commercials(entries, pos, gap2_start, commercials, policy);

        // Second gap
        pos = place_content(entries, pos, gap2_end, on_air);
        pos = self.fill_commercials(entries, pos, gap2_end, commercials, policy);

        // Closing break
        self.fill_commercials(entries, pos, block_end, commercials, policy);

        if on_air.remaining > 0 {
            Some(on_air.clone())
        } else {
            None
        }
    }

    /// Pick the title that opens a block, advancing cursors and run
    /// state. Returns `None` when nothing at all is eligible.
    #[allow(clippy::too_many_arguments)]
    fn resolve_title(
        &self,
        catalog: &CatalogSnapshot,
        channel: &Channel,
        assigned: Option<&SlotSeries>,
        movies: &[&ContentItem],
        pool: &[&ContentItem],
        cursors: &mut CursorStore,
        run: &mut RunState,
        policy: &mut dyn SelectionPolicy,
        slot: u8,
    ) -> Option<OnAir> {
        match assigned {
            Some(SlotSeries::Series { id }) => {
                let episodes = catalog.series_episodes(id);
                if episodes.is_empty() {
                    tracing::debug!(
                        channel = %channel.id,
                        series = %id,
                        slot,
                        "Assigned series has no episodes, falling back to pool"
                    );
                    run.series = None;
                    return self.pick_pooled(pool, policy);
                }
                Some(self.next_in_series(&episodes, id, channel, cursors, run, policy))
            }
            Some(SlotSeries::MoviePool) => {
                run.series = None;
                self.pick_pooled(movies, policy)
                    .or_else(|| self.pick_pooled(pool, policy))
            }
            Some(SlotSeries::Unassigned) | None => {
                run.series = None;
                self.pick_pooled(pool, policy)
            }
        }
    }

    /// Resolve the next episode of a series under the back-to-back bias
    fn next_in_series(
        &self,
        episodes: &[&ContentItem],
        series_id: &str,
        channel: &Channel,
        cursors: &mut CursorStore,
        run: &mut RunState,
        policy: &mut dyn SelectionPolicy,
    ) -> OnAir {
        if run.series.as_deref() != Some(series_id) {
            run.series = Some(series_id.to_string());
            run.remaining = policy.run_length();
        }

        let episode = if run.remaining == 0 {
            // Run over: jump somewhere else in the series, start anew
            run.remaining = policy.run_length();
            episodes[policy.jump_index(episodes.len())]
        } else {
            cursors
                .next_episode(&channel.id, series_id, episodes)
                .expect("non-empty episode list")
        };
        run.remaining = run.remaining.saturating_sub(1);

        let (season, number) = episode.sequence().expect("episodes carry a sequence");
        cursors.advance(&channel.id, series_id, CursorPos::new(season, number));

        OnAir {
            content_id: episode.id.clone(),
            offset: 0,
            remaining: episode.duration_secs,
        }
    }

    fn pick_pooled(
        &self,
        pool: &[&ContentItem],
        policy: &mut dyn SelectionPolicy,
    ) -> Option<OnAir> {
        if pool.is_empty() {
            return None;
        }
        let title = pool[policy.pick(pool.len())];
        Some(OnAir {
            content_id: title.id.clone(),
            offset: 0,
            remaining: title.duration_secs,
        })
    }

    /// Fill [pos, until) with commercials, trimming the last spot to
    /// fit. An empty pool gets the sponsor filler instead of a gap.
    fn fill_commercials(
        &self,
        entries: &mut Vec<ScheduleEntry>,
        mut pos: u32,
        until: u32,
        commercials: &[&ContentItem],
        policy: &mut dyn SelectionPolicy,
    ) -> u32 {
        while pos < until {
            if commercials.is_empty() {
                entries.push(ScheduleEntry {
                    start_offset_sec: pos,
                    end_offset_sec: until,
                    content_id: SPONSOR_FILLER_ID.to_string(),
                    content_offset_sec: 0,
                    is_commercial: true,
                });
                return until;
            }

            let spot = commercials[policy.pick(commercials.len())];
            let take = spot.duration_secs.min(until - pos);
            entries.push(ScheduleEntry {
                start_offset_sec: pos,
                end_offset_sec: pos + take,
                content_id: spot.id.clone(),
                content_offset_sec: 0,
                is_commercial: true,
            });
            pos += take;
        }
        pos
    }
}

/// Place as much of the current content as fits before `gap_end`
fn place_content(
    entries: &mut Vec<ScheduleEntry>,
    pos: u32,
    gap_end: u32,
    on_air: &mut OnAir,
) -> u32 {
    if on_air.remaining == 0 || pos >= gap_end {
        return pos;
    }
    let take = (gap_end - pos).min(on_air.remaining);
    entries.push(ScheduleEntry {
        start_offset_sec: pos,
        end_offset_sec: pos + take,
        content_id: on_air.content_id.clone(),
        content_offset_sec: on_air.offset,
        is_commercial: false,
    });
    on_air.offset += take;
    on_air.remaining -= take;
    pos + take
}

/// Force the test pattern onto 03:00-04:00, clipping whatever the block
/// construction put there. Applied last, unconditionally.
pub fn apply_test_pattern_override(entries: &mut Vec<ScheduleEntry>) {
    let mut kept = Vec::with_capacity(entries.len() + 1);
    kept.push(ScheduleEntry {
        start_offset_sec: 0,
        end_offset_sec: TEST_PATTERN_END,
        content_id: TEST_PATTERN_ID.to_string(),
        content_offset_sec: 0,
        is_commercial: false,
    });

    for entry in entries.drain(..) {
        if entry.end_offset_sec <= TEST_PATTERN_END {
            continue;
        }
        let mut entry = entry;
        if entry.start_offset_sec < TEST_PATTERN_END {
            let clipped = TEST_PATTERN_END - entry.start_offset_sec;
            entry.start_offset_sec = TEST_PATTERN_END;
            entry.content_offset_sec += clipped;
        }
        kept.push(entry);
    }

    *entries = kept;
}

// ============================================================================
// Tests
// ============================================================================
