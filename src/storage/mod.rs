//! Persistence layer for the four schedule documents
//!
//! The scheduler's state lives in four JSON documents: the weekly
//! schedule, the daily schedule, the episode cursors, and the run
//! metadata. Writes go to a temporary file first and are renamed over
//! the target, so a reader never observes a truncated document.
//! Read-modify-write cycles for the same document are serialized behind
//! a per-document lock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Current schema version written into the metadata document.
pub const SCHEMA_VERSION: u32 = 2;

/// How many per-date daily-run records the metadata document retains.
const DAILY_RUN_HISTORY: usize = 14;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure
    #[error("Storage IO error during {operation} on {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization failure
    #[error("Storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// Document keys
// ============================================================================

/// The four persisted schedule documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKey {
    /// Weekly slot assignments
    Weekly,
    /// Second-indexed daily schedule
    Daily,
    /// Episode cursors
    Cursors,
    /// Generation bookkeeping
    Meta,
}

impl DocKey {
    /// All document keys
    pub fn all() -> [Self; 4] {
        [Self::Weekly, Self::Daily, Self::Cursors, Self::Meta]
    }

    /// File name of the document
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly_schedule.json",
            Self::Daily => "daily_schedule.json",
            Self::Cursors => "episode_cursors.json",
            Self::Meta => "schedule_meta.json",
        }
    }
}

// ============================================================================
// Schedule metadata
// ============================================================================

/// Bookkeeping document used to decide whether regeneration is due
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleMeta {
    /// Schema version marker
    pub version: u32,

    /// When the weekly generator last completed
    #[serde(default)]
    pub last_weekly_run: Option<DateTime<Utc>>,

    /// When the daily builder last completed, per broadcast date
    #[serde(default)]
    pub last_daily_runs: BTreeMap<NaiveDate, DateTime<Utc>>,
}

impl Default for ScheduleMeta {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            last_weekly_run: None,
            last_daily_runs: BTreeMap::new(),
        }
    }
}

impl ScheduleMeta {
    /// Whether the daily builder already ran for a broadcast date
    pub fn daily_done(&self, date: NaiveDate) -> bool {
        self.last_daily_runs.contains_key(&date)
    }

    /// Record a completed daily run, pruning old history
    pub fn record_daily_run(&mut self, date: NaiveDate, at: DateTime<Utc>) {
        self.last_daily_runs.insert(date, at);
        while self.last_daily_runs.len() > DAILY_RUN_HISTORY {
            let oldest = *self.last_daily_runs.keys().next().expect("non-empty");
            self.last_daily_runs.remove(&oldest);
        }
    }

    /// Record a completed weekly run
    pub fn record_weekly_run(&mut self, at: DateTime<Utc>) {
        self.last_weekly_run = Some(at);
    }
}

// ============================================================================
// Store
// ============================================================================

/// Atomic whole-document store for the schedule documents
pub struct ScheduleStore {
    base_dir: PathBuf,
    locks: HashMap<DocKey, Arc<Mutex<()>>>,
}

impl ScheduleStore {
    /// Create a store rooted at the given directory
    pub fn new(base_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|source| StorageError::Io {
            operation: "create_dir",
            path: base_dir.clone(),
            source,
        })?;

        let locks = DocKey::all()
            .into_iter()
            .map(|key| (key, Arc::new(Mutex::new(()))))
            .collect();

        Ok(Self { base_dir, locks })
    }

    /// Directory the documents live in
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path(&self, key: DocKey) -> PathBuf {
        self.base_dir.join(key.file_name())
    }

    async fn lock(&self, key: DocKey) -> MutexGuard<'_, ()> {
        self.locks
            .get(&key)
            .expect("lock exists for every DocKey")
            .lock()
            .await
    }

    /// Load a document.
    ///
    /// Returns `Ok(None)` when the document is absent. A document that
    /// fails to parse is treated as absent (logged), so a corrupt file
    /// forces regeneration instead of wedging the scheduler.
    pub async fn load<T: DeserializeOwned>(&self, key: DocKey) -> StorageResult<Option<T>> {
        let _guard = self.lock(key).await;
        self.load_unlocked(key).await
    }

    async fn load_unlocked<T: DeserializeOwned>(&self, key: DocKey) -> StorageResult<Option<T>> {
        let path = self.path(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    operation: "read",
                    path,
                    source,
                })
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(
                    doc = key.file_name(),
                    error = %err,
                    "Persisted document corrupt, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Write a document atomically (temp file, then rename)
    pub async fn store<T: Serialize>(&self, key: DocKey, value: &T) -> StorageResult<()> {
        let _guard = self.lock(key).await;
        self.store_unlocked(key, value).await
    }

    async fn store_unlocked<T: Serialize>(&self, key: DocKey, value: &T) -> StorageResult<()> {
        let path = self.path(key);
        let tmp_path = self.base_dir.join(format!("{}.tmp", key.file_name()));

        let json = serde_json::to_vec_pretty(value)?;

        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|source| StorageError::Io {
                operation: "write",
                path: tmp_path.clone(),
                source,
            })?;

        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| StorageError::Io {
                operation: "rename",
                path: path.clone(),
                source,
            })?;

        tracing::debug!(doc = key.file_name(), bytes = json.len(), "Document stored");
        Ok(())
    }

    /// Read-modify-write a document under its lock.
    ///
    /// The closure receives the current value (or the default when the
    /// document is absent or corrupt); the result is written back
    /// atomically and returned.
    pub async fn modify<T, F>(&self, key: DocKey, mutate: F) -> StorageResult<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let _guard = self.lock(key).await;
        let mut value: T = self.load_unlocked(key).await?.unwrap_or_default();
        mutate(&mut value);
        self.store_unlocked(key, &value).await?;
        Ok(value)
    }
}
