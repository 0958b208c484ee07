//! Configuration management
//!
//! Settings layer: built-in defaults, optionally overridden by a TOML
//! file, optionally overridden by `PAMPERO_*` environment variables.
//! The configuration is validated before the scheduler starts.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scheduler::daily::BlockLayout;
use crate::scheduler::selection::DEFAULT_RUN_WEIGHTS;
use crate::scheduler::trigger::TriggerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Scheduling parameters
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    /// Regeneration trigger times
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the catalog documents (metadata, series,
    /// channels)
    pub content_dir: PathBuf,

    /// Directory the schedule documents are written to
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            data_dir: PathBuf::from("content"),
        }
    }
}

/// Scheduling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Broadcast time zone (IANA name)
    pub timezone: String,

    /// Commercial break lengths within a block
    #[serde(default)]
    pub breaks: BlockLayout,

    /// Back-to-back run weights: (episodes in a row, weight)
    pub back_to_back_weights: Vec<(u32, u32)>,

    /// Minimum consecutive slots a series keeps in the weekly grid
    pub stretch_min: u32,

    /// Maximum consecutive slots a series keeps in the weekly grid
    pub stretch_max: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Argentina/Buenos_Aires".to_string(),
            breaks: BlockLayout::default(),
            back_to_back_weights: DEFAULT_RUN_WEIGHTS.to_vec(),
            stretch_min: 2,
            stretch_max: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Defaults overridden by environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Full layering: defaults, then the file (when given), then env
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("PAMPERO_CONTENT_DIR") {
            self.paths.content_dir = dir.into();
        }
        if let Ok(dir) = std::env::var("PAMPERO_DATA_DIR") {
            self.paths.data_dir = dir.into();
        }
        if let Ok(tz) = std::env::var("PAMPERO_TIMEZONE") {
            self.scheduling.timezone = tz;
        }
        if let Ok(time) = std::env::var("PAMPERO_WEEKLY_TIME") {
            self.trigger.weekly_time = time;
        }
        if let Ok(time) = std::env::var("PAMPERO_DAILY_TIME") {
            self.trigger.daily_time = time;
        }
        if let Some(tick) = std::env::var("PAMPERO_TICK_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.trigger.tick_secs = tick;
        }
        if let Ok(level) = std::env::var("PAMPERO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PAMPERO_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        self.trigger
            .validate()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;

        if !self.scheduling.breaks.is_sane() {
            anyhow::bail!("Break lengths leave no room for content in a block");
        }
        if self.scheduling.back_to_back_weights.is_empty() {
            anyhow::bail!("back_to_back_weights must not be empty");
        }
        if self.scheduling.stretch_min == 0
            || self.scheduling.stretch_max < self.scheduling.stretch_min
        {
            anyhow::bail!("Invalid stretch bounds");
        }
        Ok(())
    }

    /// Parsed broadcast time zone
    pub fn tz(&self) -> Result<Tz> {
        self.scheduling
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid timezone: {}", self.scheduling.timezone))
    }
}
