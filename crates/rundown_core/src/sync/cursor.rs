//! Playback cursor context.
//!
//! The playback subsystem owns the cursor; the core only takes snapshots of it
//! through `CursorSource` at decision time.

use crate::model::entry::EntryId;
use parking_lot::RwLock;
use std::sync::Arc;

/// Which entries playback currently treats as now/next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    pub selected_event_id: Option<EntryId>,
    pub next_event_id: Option<EntryId>,
    pub selected_public_event_id: Option<EntryId>,
    pub next_public_event_id: Option<EntryId>,
}

impl PlaybackCursor {
    /// Cursor with nothing loaded.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Whether `id` is any of the four loaded references.
    pub fn references(&self, id: &str) -> bool {
        [
            &self.selected_event_id,
            &self.selected_public_event_id,
            &self.next_event_id,
            &self.next_public_event_id,
        ]
        .into_iter()
        .any(|slot| slot.as_deref() == Some(id))
    }
}

/// Read-only access to the playback cursor.
pub trait CursorSource {
    /// Returns a consistent snapshot of the cursor.
    fn cursor(&self) -> PlaybackCursor;
}

impl CursorSource for PlaybackCursor {
    fn cursor(&self) -> PlaybackCursor {
        self.clone()
    }
}

/// Cursor shared between playback (writer) and the rundown service (reader).
#[derive(Debug, Clone, Default)]
pub struct SharedCursor {
    inner: Arc<RwLock<PlaybackCursor>>,
}

impl SharedCursor {
    pub fn new(cursor: PlaybackCursor) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cursor)),
        }
    }

    /// Replaces the cursor. Called by playback.
    pub fn set(&self, cursor: PlaybackCursor) {
        *self.inner.write() = cursor;
    }
}

impl CursorSource for SharedCursor {
    fn cursor(&self) -> PlaybackCursor {
        self.inner.read().clone()
    }
}
