//! Zone-aware clock abstraction
//!
//! All scheduling math runs in wall-clock time under a configured time
//! zone. The clock is injected into the generators and the regeneration
//! loop so tests can pin time to a fixed instant.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::RwLock;

/// Source of the current time, projected into the broadcast time zone
pub trait Clock: Send + Sync {
    /// Configured broadcast time zone
    fn tz(&self) -> Tz;

    /// Current instant in UTC
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current wall-clock time in the broadcast time zone
    fn now(&self) -> DateTime<Tz> {
        self.now_utc().with_timezone(&self.tz())
    }
}

/// System clock in a fixed time zone
#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn tz(&self) -> Tz {
        self.tz
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant, for deterministic tests
pub struct FixedClock {
    tz: Tz,
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
        Self {
            tz,
            now: RwLock::new(now),
        }
    }

    /// Pin the clock to a wall-clock time in the broadcast zone
    pub fn at_local(tz: Tz, naive: chrono::NaiveDateTime) -> Self {
        let local = tz
            .from_local_datetime(&naive)
            .earliest()
            .expect("valid local time");
        Self::new(tz, local.with_timezone(&Utc))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().expect("clock lock") = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.write().expect("clock lock");
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn tz(&self) -> Tz {
        self.tz
    }

    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().expect("clock lock")
    }
}
