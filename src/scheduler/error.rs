//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Content catalog could not be loaded; generation aborts, prior
    /// schedule stays in place
    CatalogUnavailable {
        reason: String,
    },

    /// Nothing eligible to schedule for a slot or block
    NoEligibleContent {
        channel: String,
        slot: u8,
    },

    /// A persisted document failed to parse
    CorruptDocument {
        doc: String,
        reason: String,
    },

    /// A rebuild is already running for this channel
    LockContention {
        channel: String,
    },

    /// A cursor references an episode no longer present in the catalog
    CursorInconsistency {
        channel: String,
        series: String,
    },

    /// No schedule entry covers the queried instant
    NoProgram {
        channel: String,
        offset_sec: u32,
    },

    /// Unknown channel id
    UnknownChannel {
        channel: String,
    },

    /// Trigger configuration error
    TriggerConfig {
        field: String,
        reason: String,
    },

    /// Invalid half-hour slot index (must be 0-47)
    InvalidSlot {
        slot: u8,
    },

    /// Serialization/deserialization error
    Serialization {
        reason: String,
    },

    /// IO error
    Io {
        operation: String,
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogUnavailable { reason } => {
                write!(f, "Content catalog unavailable: {}", reason)
            }
            Self::NoEligibleContent { channel, slot } => {
                write!(
                    f,
                    "No eligible content for channel '{}' at slot {}",
                    channel, slot
                )
            }
            Self::CorruptDocument { doc, reason } => {
                write!(f, "Corrupt persisted document '{}': {}", doc, reason)
            }
            Self::LockContention { channel } => {
                write!(
                    f,
                    "A rebuild is already in progress for channel '{}'",
                    channel
                )
            }
            Self::CursorInconsistency { channel, series } => {
                write!(
                    f,
                    "Cursor for channel '{}' series '{}' points at a missing episode",
                    channel, series
                )
            }
            Self::NoProgram {
                channel,
                offset_sec,
            } => {
                write!(
                    f,
                    "No program scheduled for channel '{}' at day offset {}s",
                    channel, offset_sec
                )
            }
            Self::UnknownChannel { channel } => {
                write!(f, "Unknown channel '{}'", channel)
            }
            Self::TriggerConfig { field, reason } => {
                write!(f, "Trigger config error in '{}': {}", field, reason)
            }
            Self::InvalidSlot { slot } => {
                write!(f, "Invalid slot index '{}'. Must be 0-47", slot)
            }
            Self::Serialization { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
            Self::Io { operation, reason } => {
                write!(f, "IO error during '{}': {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create a catalog unavailable error
    pub fn catalog_unavailable(reason: impl Into<String>) -> Self {
        Self::CatalogUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a no eligible content error
    pub fn no_eligible_content(channel: impl Into<String>, slot: u8) -> Self {
        Self::NoEligibleContent {
            channel: channel.into(),
            slot,
        }
    }

    /// Create a corrupt document error
    pub fn corrupt_document(doc: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptDocument {
            doc: doc.into(),
            reason: reason.into(),
        }
    }

    /// Create a lock contention error
    pub fn lock_contention(channel: impl Into<String>) -> Self {
        Self::LockContention {
            channel: channel.into(),
        }
    }

    /// Create a cursor inconsistency error
    pub fn cursor_inconsistency(channel: impl Into<String>, series: impl Into<String>) -> Self {
        Self::CursorInconsistency {
            channel: channel.into(),
            series: series.into(),
        }
    }

    /// Create a no program error
    pub fn no_program(channel: impl Into<String>, offset_sec: u32) -> Self {
        Self::NoProgram {
            channel: channel.into(),
            offset_sec,
        }
    }

    /// Create an unknown channel error
    pub fn unknown_channel(channel: impl Into<String>) -> Self {
        Self::UnknownChannel {
            channel: channel.into(),
        }
    }

    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an IO error with context
    pub fn io_error(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Io {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable (worth retrying at the next tick)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CatalogUnavailable { .. }
                | Self::LockContention { .. }
                | Self::CorruptDocument { .. }
                | Self::Io { .. }
        )
    }
}
