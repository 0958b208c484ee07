//! pampero - Broadcast TV scheduling engine
//!
//! Emulates a broadcast-television programming grid: for every second of
//! every day on every channel it decides which content is on air, and
//! persists that decision so playback lookups are instantaneous.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Catalog-facing data structures
//! - [`catalog`] - Read-only content catalog and channel registry adapters
//! - [`clock`] - Zone-aware clock abstraction
//! - [`storage`] - Atomic persistence of the four schedule documents
//! - [`scheduler`] - Weekly/daily generation, cache, lookup and triggers
//!
//! # Example
//!
//! ```no_run
//! use pampero::catalog::FileCatalog;
//! use pampero::clock::SystemClock;
//! use pampero::config::Config;
//! use pampero::scheduler::SchedulerService;
//! use pampero::storage::ScheduleStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let service = SchedulerService::new(
//!         ScheduleStore::new(&config.paths.data_dir)?,
//!         Arc::new(FileCatalog::new(&config.paths.content_dir)),
//!         Arc::new(SystemClock::new(config.tz()?)),
//!     );
//!     service.bootstrap().await?;
//!     let program = service
//!         .get_current_program("channel_1", chrono::Utc::now())
//!         .await?;
//!     println!("on air: {}", program.content_id);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{CatalogProvider, CatalogSnapshot, FileCatalog};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{Channel, ContentItem, ContentKind, ProgrammingZone};
    pub use crate::scheduler::{
        ProgramAt, RegenerationLoop, ScheduleStatus, SchedulerService,
    };
    pub use crate::storage::{DocKey, ScheduleStore};
}

// Direct re-exports for convenience
pub use models::{Channel, ContentItem, ContentKind, ProgrammingZone};
