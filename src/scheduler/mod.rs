//! Broadcast scheduling engine
//!
//! This module turns the content catalog and the channel registry into a
//! deterministic, time-indexed programming plan and answers "what plays
//! right now" queries against it.
//!
//! # Overview
//!
//! The scheduling day runs 03:00-to-03:00 local time and is divided into
//! 48 half-hour programming blocks. Once per week every broadcast-mode
//! channel gets a series assigned to each block of the week; once per
//! day those assignments are expanded into a second-by-second play list
//! with commercial breaks at every block's start, middle and end. The
//! 03:00-04:00 window is always the test pattern, on every channel,
//! unconditionally.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      RegenerationLoop                        │
//! │   Sunday 02:30 ──► weekly     daily ◄── 03:00 / rebuild      │
//! └───────────────────────┬──────────────┬───────────────────────┘
//!                         │              │
//!                  ┌──────▼──────┐ ┌─────▼──────┐
//!                  │   Weekly    │ │   Daily    │◄── CursorStore
//!                  │  Generator  │ │  Builder   │◄── SelectionPolicy
//!                  └──────┬──────┘ └─────┬──────┘
//!                         │              │
//!                  ┌──────▼──────────────▼──────┐
//!                  │  ScheduleStore (4 x JSON)  │
//!                  └─────────────┬──────────────┘
//!                                │
//!                       ┌────────▼────────┐
//!                       │  ScheduleCache  │──► lookup(channel, t)
//!                       └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`zone`] - broadcast-day math, slots and programming zones
//! - [`weekly`] - weekly slot-grid generation
//! - [`cursor`] - per-(channel, series) episode cursors
//! - [`selection`] - injectable back-to-back selection policy
//! - [`daily`] - block assembly and the daily play list
//! - [`cache`] - read-optimized lookup cache with atomic swaps
//! - [`service`] - facade tying store, cache, catalog and clock together
//! - [`trigger`] - calendar-driven regeneration loop
//!
//! # Determinism
//!
//! All randomness flows from ChaCha8 generators seeded by (channel,
//! date). Rebuilding a channel's day with an unchanged catalog produces
//! the identical play list and leaves the cursors at the same values.

pub mod cache;
pub mod cursor;
pub mod daily;
pub mod error;
pub mod selection;
pub mod service;
pub mod trigger;
pub mod weekly;
pub mod zone;

// Re-export main types
pub use cache::{CacheStatus, ProgramAt, ScheduleCache};
pub use cursor::{ChannelCursors, CursorPos, CursorStore};
pub use daily::{
    apply_test_pattern_override, is_day_partition, BlockLayout, ChannelDay, DailyBuilder,
    DailySchedule, ScheduleEntry,
};
pub use error::{SchedulerError, SchedulerResult};
pub use selection::{FixedSelection, SelectionPolicy, WeightedSelection, DEFAULT_RUN_WEIGHTS};
pub use service::{ScheduleStatus, SchedulerService};
pub use trigger::{RegenerationLoop, TriggerConfig, TriggerEvent};
pub use weekly::{ChannelWeek, SlotAssignment, SlotSeries, WeeklyGenerator, WeeklySchedule};
pub use zone::{
    broadcast_instant, BroadcastInstant, SPONSOR_FILLER_ID, TEST_PATTERN_ID,
};
