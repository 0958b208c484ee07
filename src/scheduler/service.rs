//! Scheduler service facade
//!
//! `SchedulerService` owns the persistence layer, the lookup cache and
//! the injected catalog/clock, and exposes the operations the rest of
//! the system calls: weekly/daily generation, per-channel rebuild,
//! playback lookup and status. Generation for one channel is guarded by
//! a per-channel lock shared between the automatic loop and manual
//! rebuilds; a second rebuild for the same channel is rejected with
//! `LockContention` rather than queued.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::cache::{ProgramAt, ScheduleCache};
use super::cursor::CursorStore;
use super::daily::{BlockLayout, ChannelDay, DailyBuilder, DailySchedule};
use super::error::{SchedulerError, SchedulerResult};
use super::selection::{WeightedSelection, DEFAULT_RUN_WEIGHTS};
use super::weekly::{WeeklyGenerator, WeeklySchedule};
use super::zone::{broadcast_instant, day_bounds, week_start};
use crate::catalog::{CatalogProvider, CatalogSnapshot};
use crate::clock::Clock;
use crate::models::{Channel, ChannelId};
use crate::storage::{DocKey, ScheduleMeta, ScheduleStore, StorageError};

/// Snapshot of the scheduler's bookkeeping, cheap to query
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleStatus {
    /// When the weekly generator last completed
    pub last_weekly_run: Option<DateTime<Utc>>,

    /// When the current broadcast date was last built
    pub last_daily_run: Option<DateTime<Utc>>,

    /// Channels with a build currently running
    pub rebuild_in_progress: BTreeSet<ChannelId>,
}

fn storage_err(err: StorageError) -> SchedulerError {
    SchedulerError::io_error("storage", err.to_string())
}

/// Facade over generation, persistence, cache and lookup
pub struct SchedulerService {
    store: ScheduleStore,
    cache: ScheduleCache,
    catalog: Arc<dyn CatalogProvider>,
    clock: Arc<dyn Clock>,
    weekly: WeeklyGenerator,
    builder: DailyBuilder,
    run_weights: Vec<(u32, u32)>,
    build_locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
    in_progress: RwLock<BTreeSet<ChannelId>>,
}

impl SchedulerService {
    /// Create a service with default generator settings
    pub fn new(
        store: ScheduleStore,
        catalog: Arc<dyn CatalogProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache: ScheduleCache::new(),
            catalog,
            clock,
            weekly: WeeklyGenerator::default(),
            builder: DailyBuilder::default(),
            run_weights: DEFAULT_RUN_WEIGHTS.to_vec(),
            build_locks: Mutex::new(HashMap::new()),
            in_progress: RwLock::new(BTreeSet::new()),
        }
    }

    /// Override the weekly generator
    pub fn with_weekly_generator(mut self, weekly: WeeklyGenerator) -> Self {
        self.weekly = weekly;
        self
    }

    /// Override the block layout
    pub fn with_block_layout(mut self, layout: BlockLayout) -> Self {
        self.builder = DailyBuilder::new(layout);
        self
    }

    /// Override the back-to-back run weights
    pub fn with_run_weights(mut self, weights: Vec<(u32, u32)>) -> Self {
        self.run_weights = weights;
        self
    }

    /// Clock in use (shared with the regeneration loop)
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Broadcast date the clock currently falls in
    pub fn current_broadcast_date(&self) -> NaiveDate {
        broadcast_instant(self.clock.now()).date
    }

    /// Load the persisted daily schedule into the cache on startup
    pub async fn bootstrap(&self) -> SchedulerResult<()> {
        match self
            .store
            .load::<DailySchedule>(DocKey::Daily)
            .await
            .map_err(storage_err)?
        {
            Some(daily) => {
                tracing::info!(date = %daily.schedule_date, "Restoring persisted daily schedule");
                self.cache.install(&daily).await;
            }
            None => {
                // A missing or corrupt daily document forces regeneration
                // even when the bookkeeping claims the day was built
                let date = self.current_broadcast_date();
                self.store
                    .modify(DocKey::Meta, |meta: &mut ScheduleMeta| {
                        meta.last_daily_runs.remove(&date);
                    })
                    .await
                    .map_err(storage_err)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// Generate the weekly schedule for the week containing today
    pub async fn generate_weekly(&self) -> SchedulerResult<WeeklySchedule> {
        let catalog = self.load_catalog().await?;
        let start = week_start(self.clock.now().date_naive());

        let schedule = self.weekly.generate(&catalog, start, self.clock.now_utc());
        self.store
            .store(DocKey::Weekly, &schedule)
            .await
            .map_err(storage_err)?;

        let at = self.clock.now_utc();
        self.store
            .modify(DocKey::Meta, |meta: &mut ScheduleMeta| {
                meta.record_weekly_run(at);
            })
            .await
            .map_err(storage_err)?;

        Ok(schedule)
    }

    /// Build the daily schedule for the current broadcast date
    pub async fn generate_daily(&self) -> SchedulerResult<DailySchedule> {
        let date = self.current_broadcast_date();
        self.generate_daily_for(date).await
    }

    /// Build the daily schedule for a specific broadcast date.
    ///
    /// One channel's failure is logged and skipped; the other channels
    /// still complete. A catalog failure aborts the whole pass and
    /// leaves the prior documents untouched.
    pub async fn generate_daily_for(&self, date: NaiveDate) -> SchedulerResult<DailySchedule> {
        let catalog = self.load_catalog().await?;
        let weekly = self.ensure_weekly(&catalog, date).await?;

        let mut cursors: CursorStore = self
            .store
            .load(DocKey::Cursors)
            .await
            .map_err(storage_err)?
            .unwrap_or_default();
        let prior: Option<DailySchedule> =
            self.store.load(DocKey::Daily).await.map_err(storage_err)?;

        let (valid_from, valid_until) = day_bounds(date, self.clock.tz());
        let mut schedule =
            DailySchedule::new(date, self.clock.now_utc(), valid_from, valid_until);

        for channel in catalog.list_channels() {
            let lock = self.channel_lock(&channel.id).await;
            let _guard = lock.lock().await;
            self.set_in_progress(&channel.id, true).await;

            let built =
                self.build_one(&catalog, &weekly, &mut cursors, prior.as_ref(), channel, date);
            self.set_in_progress(&channel.id, false).await;

            match built {
                Ok(day) => {
                    schedule.set_channel(channel.id.clone(), day);
                }
                Err(err) => {
                    tracing::warn!(
                        channel = %channel.id,
                        error = %err,
                        "Channel build failed, skipping"
                    );
                }
            }
        }

        self.store
            .store(DocKey::Daily, &schedule)
            .await
            .map_err(storage_err)?;
        self.store
            .store(DocKey::Cursors, &cursors)
            .await
            .map_err(storage_err)?;
        self.cache.install(&schedule).await;

        let at = self.clock.now_utc();
        self.store
            .modify(DocKey::Meta, |meta: &mut ScheduleMeta| {
                meta.record_daily_run(date, at);
            })
            .await
            .map_err(storage_err)?;

        tracing::info!(
            date = %date,
            channels = schedule.channels.len(),
            "Daily schedule generated"
        );
        Ok(schedule)
    }

    /// Rebuild one channel's current day (and its weekly assignments)
    /// on demand. Rejected with `LockContention` while another build of
    /// the same channel is running; automatic cadence bookkeeping is
    /// not touched.
    pub async fn rebuild_channel(&self, channel_id: &str) -> SchedulerResult<()> {
        let lock = self.channel_lock(channel_id).await;
        let Ok(_guard) = lock.try_lock() else {
            return Err(SchedulerError::lock_contention(channel_id));
        };

        self.set_in_progress(channel_id, true).await;
        let result = self.rebuild_channel_locked(channel_id).await;
        self.set_in_progress(channel_id, false).await;
        result
    }

    async fn rebuild_channel_locked(&self, channel_id: &str) -> SchedulerResult<()> {
        // The catalog snapshot is taken under this channel's lock so the
        // rebuild sees one consistent library view
        let catalog = self.load_catalog().await?;
        let channel = catalog
            .channel(channel_id)
            .cloned()
            .ok_or_else(|| SchedulerError::unknown_channel(channel_id))?;
        self.rebuild_with(&catalog, &channel).await
    }

    async fn rebuild_with(
        &self,
        catalog: &CatalogSnapshot,
        channel: &Channel,
    ) -> SchedulerResult<()> {
        let date = self.current_broadcast_date();
        let start = week_start(date);

        // Refresh this channel's weekly assignments without touching
        // the other channels' rows
        let mut weekly = match self
            .store
            .load::<WeeklySchedule>(DocKey::Weekly)
            .await
            .map_err(storage_err)?
        {
            Some(w) if w.covers(start) => w,
            _ => WeeklySchedule::new(start, self.clock.now_utc()),
        };
        if channel.is_broadcast() {
            let week = self.weekly.generate_channel(catalog, start, channel);
            weekly.set_channel(channel.id.clone(), week);
            self.store
                .store(DocKey::Weekly, &weekly)
                .await
                .map_err(storage_err)?;
        }

        let mut cursors: CursorStore = self
            .store
            .load(DocKey::Cursors)
            .await
            .map_err(storage_err)?
            .unwrap_or_default();
        let prior: Option<DailySchedule> =
            self.store.load(DocKey::Daily).await.map_err(storage_err)?;

        let (valid_from, valid_until) = day_bounds(date, self.clock.tz());
        let mut schedule = match prior.clone() {
            Some(p) if p.covers(date) => p,
            _ => DailySchedule::new(date, self.clock.now_utc(), valid_from, valid_until),
        };

        let day = self.build_one(catalog, &weekly, &mut cursors, prior.as_ref(), channel, date)?;
        let entries = day.entries.clone();
        schedule.set_channel(channel.id.clone(), day);
        schedule.generated_at = self.clock.now_utc();

        self.store
            .store(DocKey::Daily, &schedule)
            .await
            .map_err(storage_err)?;
        self.store
            .store(DocKey::Cursors, &cursors)
            .await
            .map_err(storage_err)?;
        self.cache
            .install_channel(date, channel.id.clone(), entries)
            .await;

        tracing::info!(channel = %channel.id, date = %date, "Channel rebuilt");
        Ok(())
    }

    /// Build one channel's day, restoring the cursor baseline first
    /// when the day was already built (idempotent rebuild)
    fn build_one(
        &self,
        catalog: &CatalogSnapshot,
        weekly: &WeeklySchedule,
        cursors: &mut CursorStore,
        prior: Option<&DailySchedule>,
        channel: &Channel,
        date: NaiveDate,
    ) -> SchedulerResult<ChannelDay> {
        if let Some(prev) = prior
            .filter(|p| p.covers(date))
            .and_then(|p| p.channel(&channel.id))
        {
            cursors.restore_channel(&channel.id, prev.cursor_baseline.clone());
        }
        let baseline = cursors.snapshot_channel(&channel.id);

        let mut policy = WeightedSelection::for_channel_day(&self.run_weights, &channel.id, date)?;
        let week = weekly.channels.get(&channel.id);
        let entries = self
            .builder
            .build_channel(catalog, week, cursors, channel, date, &mut policy);

        Ok(ChannelDay {
            entries,
            cursor_baseline: baseline,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// What is on air for a channel at a given instant
    pub async fn get_current_program(
        &self,
        channel_id: &str,
        at: DateTime<Utc>,
    ) -> SchedulerResult<ProgramAt> {
        let local = at.with_timezone(&self.clock.tz());
        self.cache.lookup(channel_id, broadcast_instant(local)).await
    }

    /// Bookkeeping snapshot; never blocks on a running build
    pub async fn status(&self) -> SchedulerResult<ScheduleStatus> {
        let meta: ScheduleMeta = self
            .store
            .load(DocKey::Meta)
            .await
            .map_err(storage_err)?
            .unwrap_or_default();
        let date = self.current_broadcast_date();

        Ok(ScheduleStatus {
            last_weekly_run: meta.last_weekly_run,
            last_daily_run: meta.last_daily_runs.get(&date).copied(),
            rebuild_in_progress: self.in_progress.read().await.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn load_catalog(&self) -> SchedulerResult<CatalogSnapshot> {
        self.catalog
            .load()
            .await
            .map_err(|err| SchedulerError::catalog_unavailable(err.to_string()))
    }

    async fn ensure_weekly(
        &self,
        catalog: &CatalogSnapshot,
        date: NaiveDate,
    ) -> SchedulerResult<WeeklySchedule> {
        let start = week_start(date);
        match self
            .store
            .load::<WeeklySchedule>(DocKey::Weekly)
            .await
            .map_err(storage_err)?
        {
            Some(weekly) if weekly.covers(start) => Ok(weekly),
            _ => {
                tracing::info!(week_start = %start, "Weekly schedule absent or stale, regenerating");
                let weekly = self.weekly.generate(catalog, start, self.clock.now_utc());
                self.store
                    .store(DocKey::Weekly, &weekly)
                    .await
                    .map_err(storage_err)?;
                Ok(weekly)
            }
        }
    }

    async fn channel_lock(&self, channel_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.build_locks.lock().await;
        locks
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn set_in_progress(&self, channel_id: &str, active: bool) {
        let mut set = self.in_progress.write().await;
        if active {
            set.insert(channel_id.to_string());
        } else {
            set.remove(channel_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::clock::FixedClock;
    use crate::models::{ContentItem, ContentKind, SeriesInfo, ZoneAffinity};
    use crate::scheduler::zone::{TEST_PATTERN_ID, TEST_PATTERN_END};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn fixture_catalog() -> CatalogSnapshot {
        let mut content = BTreeMap::new();
        for number in 1..=5u32 {
            let id = format!("serie_s_e{number}");
            content.insert(
                id.clone(),
                ContentItem {
                    id,
                    title: format!("S E{number}"),
                    kind: ContentKind::Episode,
                    series: Some("serie_s".to_string()),
                    season: Some(1),
                    episode: Some(number),
                    duration_secs: 1200,
                    tags: vec![],
                },
            );
        }
        content.insert(
            "spot_1".to_string(),
            ContentItem {
                id: "spot_1".to_string(),
                title: "Spot".to_string(),
                kind: ContentKind::Commercial,
                series: None,
                season: None,
                episode: None,
                duration_secs: 30,
                tags: vec![],
            },
        );

        let mut series = BTreeMap::new();
        series.insert(
            "serie_s".to_string(),
            SeriesInfo {
                time_of_day: ZoneAffinity::Any,
            },
        );

        let mut channels = BTreeMap::new();
        channels.insert(
            "c1".to_string(),
            Channel {
                id: String::new(),
                name: "Canal 1".to_string(),
                series_filter: Some(vec!["serie_s".to_string()]),
                category_filter: None,
                tag_filter: vec![],
            },
        );

        CatalogSnapshot::new(content, series, channels)
    }

    fn fixture_service(dir: &std::path::Path) -> SchedulerService {
        let tz: chrono_tz::Tz = "America/Argentina/Buenos_Aires".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2025, 6, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let clock = Arc::new(FixedClock::at_local(tz, naive));
        let store = ScheduleStore::new(dir.join("content")).unwrap();
        SchedulerService::new(
            store,
            Arc::new(StaticCatalog::new(fixture_catalog())),
            clock,
        )
    }

    #[tokio::test]
    async fn test_generate_daily_serves_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let service = fixture_service(dir.path());

        let schedule = service.generate_daily().await.unwrap();
        assert!(schedule.is_complete());

        // 17:00 local on the generated day
        let at = service.clock().now_utc() + chrono::Duration::hours(5);
        let program = service.get_current_program("c1", at).await.unwrap();
        assert!(!program.content_id.is_empty());
    }

    #[tokio::test]
    async fn test_test_pattern_hour_after_generation() {
        let dir = tempfile::tempdir().unwrap();
        let service = fixture_service(dir.path());
        service.generate_daily().await.unwrap();

        let daily: DailySchedule = service
            .store
            .load(DocKey::Daily)
            .await
            .unwrap()
            .unwrap();
        let entries = &daily.channel("c1").unwrap().entries;
        assert_eq!(entries[0].content_id, TEST_PATTERN_ID);
        assert_eq!(entries[0].end_offset_sec, TEST_PATTERN_END);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = fixture_service(dir.path());
        service.generate_daily().await.unwrap();

        let first: DailySchedule = service.store.load(DocKey::Daily).await.unwrap().unwrap();
        let cursors_first: CursorStore =
            service.store.load(DocKey::Cursors).await.unwrap().unwrap();

        service.rebuild_channel("c1").await.unwrap();
        service.rebuild_channel("c1").await.unwrap();

        let second: DailySchedule = service.store.load(DocKey::Daily).await.unwrap().unwrap();
        let cursors_second: CursorStore =
            service.store.load(DocKey::Cursors).await.unwrap().unwrap();

        assert_eq!(
            first.channel("c1").unwrap().entries,
            second.channel("c1").unwrap().entries
        );
        assert_eq!(cursors_first, cursors_second);
    }

    #[tokio::test]
    async fn test_rebuild_unknown_channel() {
        let dir = tempfile::tempdir().unwrap();
        let service = fixture_service(dir.path());
        assert!(matches!(
            service.rebuild_channel("nope").await,
            Err(SchedulerError::UnknownChannel { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_reports_runs() {
        let dir = tempfile::tempdir().unwrap();
        let service = fixture_service(dir.path());

        let before = service.status().await.unwrap();
        assert!(before.last_daily_run.is_none());
        assert!(before.rebuild_in_progress.is_empty());

        service.generate_weekly().await.unwrap();
        service.generate_daily().await.unwrap();

        let after = service.status().await.unwrap();
        assert!(after.last_weekly_run.is_some());
        assert!(after.last_daily_run.is_some());
    }
}
