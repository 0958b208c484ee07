//! Regeneration trigger loop
//!
//! A background task evaluated at a short fixed interval. Each tick
//! compares the persisted last-run timestamps against the zone-aware
//! clock: the weekly generator fires once per Sunday-02:30 crossing,
//! the daily builder once per broadcast date. Because the decision is
//! made against persisted bookkeeping rather than process uptime, a
//! restart mid-day does not re-trigger generation.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::error::{SchedulerError, SchedulerResult};
use super::service::SchedulerService;

// ============================================================================
// Trigger configuration
// ============================================================================

/// Configuration for the regeneration loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Local time of the weekly generation on Sundays (HH:MM)
    pub weekly_time: String,

    /// Local time of the daily generation (HH:MM)
    pub daily_time: String,

    /// Seconds between due-checks
    pub tick_secs: u64,

    /// Build missing schedules immediately on startup
    pub generate_on_startup: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            weekly_time: "02:30".to_string(),
            daily_time: "03:00".to_string(),
            tick_secs: 30,
            generate_on_startup: true,
        }
    }
}

impl TriggerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        if NaiveTime::parse_from_str(&self.weekly_time, "%H:%M").is_err() {
            return Err(SchedulerError::trigger_config(
                "weekly_time",
                format!("Invalid time format '{}'. Expected HH:MM", self.weekly_time),
            ));
        }
        if NaiveTime::parse_from_str(&self.daily_time, "%H:%M").is_err() {
            return Err(SchedulerError::trigger_config(
                "daily_time",
                format!("Invalid time format '{}'. Expected HH:MM", self.daily_time),
            ));
        }
        if self.tick_secs == 0 {
            return Err(SchedulerError::trigger_config(
                "tick_secs",
                "Tick interval must be positive",
            ));
        }
        Ok(())
    }

    /// Parse the weekly generation time
    pub fn parse_weekly_time(&self) -> SchedulerResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.weekly_time, "%H:%M").map_err(|_| {
            SchedulerError::trigger_config(
                "weekly_time",
                format!("Invalid time: {}", self.weekly_time),
            )
        })
    }

    /// Parse the daily generation time
    pub fn parse_daily_time(&self) -> SchedulerResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_time, "%H:%M").map_err(|_| {
            SchedulerError::trigger_config(
                "daily_time",
                format!("Invalid time: {}", self.daily_time),
            )
        })
    }
}

// ============================================================================
// Trigger events
// ============================================================================

/// Events emitted by the regeneration loop
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    /// Weekly generation completed
    WeeklyGenerated {
        week_start: NaiveDate,
        at: DateTime<Utc>,
    },

    /// Daily generation completed
    DailyGenerated {
        date: NaiveDate,
        at: DateTime<Utc>,
    },
}

// ============================================================================
// Regeneration loop
// ============================================================================

/// Background control loop driving weekly and daily generation
pub struct RegenerationLoop {
    config: TriggerConfig,
    service: Arc<SchedulerService>,
    events: broadcast::Sender<TriggerEvent>,
    is_running: Arc<RwLock<bool>>,
}

impl RegenerationLoop {
    /// Create a loop for a service
    pub fn new(config: TriggerConfig, service: Arc<SchedulerService>) -> SchedulerResult<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            config,
            service,
            events,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Create with default config
    pub fn with_defaults(service: Arc<SchedulerService>) -> SchedulerResult<Self> {
        Self::new(TriggerConfig::default(), service)
    }

    /// Subscribe to generation events
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerEvent> {
        self.events.subscribe()
    }

    /// Run the loop until stopped
    pub async fn start(&self) -> SchedulerResult<()> {
        *self.is_running.write().await = true;
        tracing::info!(
            weekly = %self.config.weekly_time,
            daily = %self.config.daily_time,
            tick_secs = self.config.tick_secs,
            "Regeneration loop started"
        );

        if self.config.generate_on_startup {
            if let Err(err) = self.run_startup().await {
                tracing::warn!(error = %err, "Startup generation failed, retrying on cadence");
            }
        }

        while *self.is_running.read().await {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(self.config.tick_secs)) => {
                    if let Err(err) = self.check_due().await {
                        tracing::warn!(error = %err, "Trigger tick failed");
                    }
                }
                _ = self.wait_for_stop() => {
                    break;
                }
            }
        }

        tracing::info!("Regeneration loop stopped");
        Ok(())
    }

    /// Stop the loop
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    /// Check if the loop is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Evaluate both trigger thresholds once. Failures are recoverable:
    /// the prior schedule stays in place and the next tick retries.
    pub async fn check_due(&self) -> SchedulerResult<()> {
        let now_local = self.service.clock().now();
        let status = self.service.status().await?;

        // Weekly: fire once per Sunday crossing
        let weekly_time = self.config.parse_weekly_time()?;
        if let Some(crossing) = last_weekly_crossing(now_local, weekly_time) {
            let due = status.last_weekly_run.map_or(true, |last| last < crossing);
            if due {
                match self.service.generate_weekly().await {
                    Ok(schedule) => {
                        let _ = self.events.send(TriggerEvent::WeeklyGenerated {
                            week_start: schedule.week_start,
                            at: Utc::now(),
                        });
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Weekly generation failed");
                    }
                }
            }
        }

        // Daily: fire once per broadcast date, not before the daily time
        let daily_time = self.config.parse_daily_time()?;
        if status.last_daily_run.is_none() && now_local.time() >= daily_time {
            match self.service.generate_daily().await {
                Ok(schedule) => {
                    let _ = self.events.send(TriggerEvent::DailyGenerated {
                        date: schedule.schedule_date,
                        at: Utc::now(),
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Daily generation failed");
                }
            }
        }

        Ok(())
    }

    // Internal: build missing schedules right away on startup
    async fn run_startup(&self) -> SchedulerResult<()> {
        let status = self.service.status().await?;
        if status.last_daily_run.is_none() {
            let schedule = self.service.generate_daily().await?;
            let _ = self.events.send(TriggerEvent::DailyGenerated {
                date: schedule.schedule_date,
                at: Utc::now(),
            });
        }
        Ok(())
    }

    // Internal: wait for the stop flag
    async fn wait_for_stop(&self) {
        loop {
            if !*self.is_running.read().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

/// Most recent Sunday-at-`at` instant on or before `now`, if one
/// resolves in the zone
fn last_weekly_crossing(now: DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Utc>> {
    let today = now.date_naive();
    for back in 0..=7u64 {
        let date = today - chrono::Days::new(back);
        if date.weekday() != Weekday::Sun {
            continue;
        }
        if let Some(local) = now.timezone().from_local_datetime(&date.and_time(at)).earliest() {
            if local <= now {
                return Some(local.with_timezone(&Utc));
            }
        }
    }
    None
}
