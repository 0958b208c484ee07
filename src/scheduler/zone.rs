//! Broadcast-day and slot arithmetic
//!
//! The scheduling day runs from 03:00 local to 03:00 the next day. Offsets
//! within a broadcast day are counted in seconds from 03:00, and the day
//! is divided into 48 half-hour slots. Slots 0 and 1 (03:00-04:00) are
//! the test pattern hour and are never assigned by the generators.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Weekday};
use chrono_tz::Tz;

use crate::models::ProgrammingZone;

/// Seconds in a broadcast day.
pub const DAY_SECS: u32 = 86_400;

/// Seconds in one programming block (half hour).
pub const BLOCK_SECS: u32 = 1_800;

/// Half-hour slots per broadcast day.
pub const SLOTS_PER_DAY: u8 = 48;

/// First slot the generators may assign (03:00-04:00 is reserved).
pub const FIRST_ASSIGNABLE_SLOT: u8 = 2;

/// Wall-clock hour at which the broadcast day starts.
pub const DAY_START_HOUR: u32 = 3;

/// End of the reserved test pattern window, as a day offset.
pub const TEST_PATTERN_END: u32 = 3_600;

/// Content id of the guaranteed fallback program.
pub const TEST_PATTERN_ID: &str = "test_pattern";

/// Content id of the commercial-break filler used when the pool is empty.
pub const SPONSOR_FILLER_ID: &str = "sponsor_filler";

/// A timestamp resolved into the broadcast-day model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastInstant {
    /// Broadcast date (the civil date the day started on)
    pub date: NaiveDate,
    /// Seconds since 03:00 of that date
    pub offset_sec: u32,
}

/// Resolve a zoned wall-clock time into (broadcast date, day offset).
///
/// Times before 03:00 belong to the previous civil date's broadcast day.
pub fn broadcast_instant(local: DateTime<Tz>) -> BroadcastInstant {
    let civil = local.date_naive();
    let secs_since_midnight = local.num_seconds_from_midnight();
    let day_start = DAY_START_HOUR * 3_600;

    if secs_since_midnight >= day_start {
        BroadcastInstant {
            date: civil,
            offset_sec: secs_since_midnight - day_start,
        }
    } else {
        BroadcastInstant {
            date: civil.pred_opt().expect("date range"),
            offset_sec: secs_since_midnight + (DAY_SECS - day_start),
        }
    }
}

/// Day offset at which a slot begins.
pub fn slot_offset(slot: u8) -> u32 {
    slot as u32 * BLOCK_SECS
}

/// Wall-clock hour a slot falls in.
pub fn wall_hour_for_slot(slot: u8) -> u32 {
    (DAY_START_HOUR + slot as u32 / 2) % 24
}

/// Programming zone a slot falls in.
pub fn zone_for_slot(slot: u8) -> ProgrammingZone {
    ProgrammingZone::for_hour(wall_hour_for_slot(slot))
}

/// UTC instants a broadcast date spans: 03:00 local to 03:00 local the
/// next day. Ambiguous local times (DST) resolve to the earliest
/// mapping.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<chrono::Utc>, DateTime<chrono::Utc>) {
    use chrono::TimeZone;

    let start_naive = date
        .and_hms_opt(DAY_START_HOUR, 0, 0)
        .expect("valid day start");
    let end_naive = (date + chrono::Days::new(1))
        .and_hms_opt(DAY_START_HOUR, 0, 0)
        .expect("valid day end");

    let start = tz
        .from_local_datetime(&start_naive)
        .earliest()
        .expect("resolvable day start")
        .with_timezone(&chrono::Utc);
    let end = tz
        .from_local_datetime(&end_naive)
        .earliest()
        .expect("resolvable day end")
        .with_timezone(&chrono::Utc);
    (start, end)
}

/// Most recent week boundary (Sunday) on or before the given date.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = date.weekday().num_days_from_sunday() as u64;
    date - chrono::Days::new(back)
}

/// Day-of-week index within the scheduling week (0 = Sunday).
pub fn day_of_week_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Whether the date is the weekly generation day.
pub fn is_week_boundary(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}
