//! Rundown and timer-synchronization core.
//!
//! Owns the ordered rundown of events, delays and blocks, applies edits under a
//! single-writer discipline, and decides after each edit whether the running
//! timer must reload.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, RundownConfig, DEFAULT_MAX_EVENTS};
pub use logging::{
    default_log_level, init_logging, logging_status, LogLevel, LogSettings, LoggingError,
};
pub use model::delay::apply_delay;
pub use model::entry::{
    BlockDraft, BlockEntry, DelayDraft, DelayEntry, DelayPatch, Entry, EntryDraft, EntryId,
    EntryKind, EntryPatch, EntryValidationError, EventDraft, EventEntry, EventPatch,
};
pub use model::id::generate_id;
pub use model::rundown::{AffectedIds, EntryChange, Rundown, StoreError, StoreResult};
pub use repo::rundown_repo::{RepoError, RepoResult, RundownRepository, SqliteRundownRepository};
pub use service::import::{parse_rundown, parse_rundown_str, ImportError};
pub use service::rundown_service::{InsertPosition, RundownError, RundownService};
pub use sync::cursor::{CursorSource, PlaybackCursor, SharedCursor};
pub use sync::decider::{decide_resync, resync_reason, ResyncReason};
pub use sync::timer::{LogTimer, TimerSync};

/// Minimal health-check API for integration smoke tests.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
