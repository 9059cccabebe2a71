//! Timer resync decision.
//!
//! # Invariants
//! - Never errors and never mutates the cursor or the rundown.
//! - An idle cursor (nothing selected) never requests a resync.
//! - Untracked mutations always request a resync while a timer is running.

use crate::model::entry::EventEntry;
use crate::model::rundown::{AffectedIds, Rundown};
use crate::sync::cursor::PlaybackCursor;

/// Why a resync was (or was not) requested. Used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    /// Nothing selected; timer is idle.
    Idle,
    /// Mutation impact is not tracked.
    Untracked,
    /// A loaded entry was itself touched.
    LoadedEntryAffected,
    /// now/next are no longer consecutive timed events.
    NextStale,
    /// A public event now sits between now-public and next-public.
    PublicNextStale,
    /// Loaded view is still accurate.
    Unaffected,
}

impl ResyncReason {
    pub fn requires_resync(self) -> bool {
        matches!(
            self,
            Self::Untracked | Self::LoadedEntryAffected | Self::NextStale | Self::PublicNextStale
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Untracked => "untracked",
            Self::LoadedEntryAffected => "loaded_entry_affected",
            Self::NextStale => "next_stale",
            Self::PublicNextStale => "public_next_stale",
            Self::Unaffected => "unaffected",
        }
    }
}

/// Returns whether the timer must reload after a mutation touching `affected`.
pub fn decide_resync(cursor: &PlaybackCursor, rundown: &Rundown, affected: &AffectedIds) -> bool {
    resync_reason(cursor, rundown, affected).requires_resync()
}

/// Evaluates the resync rules in order and returns the first that applies.
pub fn resync_reason(
    cursor: &PlaybackCursor,
    rundown: &Rundown,
    affected: &AffectedIds,
) -> ResyncReason {
    if cursor.selected_event_id.is_none() {
        return ResyncReason::Idle;
    }

    let Some(ids) = affected.ids() else {
        return ResyncReason::Untracked;
    };
    if ids.iter().any(|id| cursor.references(id)) {
        return ResyncReason::LoadedEntryAffected;
    }

    let timed: Vec<&EventEntry> = rundown.timed_events().collect();
    if !now_and_next_adjacent(cursor, &timed) {
        return ResyncReason::NextStale;
    }
    if public_event_between(cursor, &timed) {
        return ResyncReason::PublicNextStale;
    }
    ResyncReason::Unaffected
}

fn now_and_next_adjacent(cursor: &PlaybackCursor, timed: &[&EventEntry]) -> bool {
    let index_of = |id: Option<&str>| id.and_then(|id| timed.iter().position(|e| e.id == id));

    match (
        index_of(cursor.selected_event_id.as_deref()),
        index_of(cursor.next_event_id.as_deref()),
    ) {
        (Some(now), Some(next)) => next == now + 1,
        _ => false,
    }
}

fn public_event_between(cursor: &PlaybackCursor, timed: &[&EventEntry]) -> bool {
    let Some(now_public) = cursor.selected_public_event_id.as_deref() else {
        return false;
    };
    let next_public = cursor.next_public_event_id.as_deref();

    timed
        .iter()
        .skip_while(|event| event.id != now_public)
        .skip(1)
        .take_while(|event| Some(event.id.as_str()) != next_public)
        .any(|event| event.is_public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entry::{BlockEntry, Entry};

    fn event(id: &str, is_public: bool) -> Entry {
        let mut event = EventEntry::with_id(id);
        event.is_public = is_public;
        Entry::Event(event)
    }

    fn cursor(now: &str, next: &str) -> PlaybackCursor {
        PlaybackCursor {
            selected_event_id: Some(now.to_string()),
            next_event_id: Some(next.to_string()),
            ..PlaybackCursor::default()
        }
    }

    fn rundown(entries: Vec<Entry>) -> Rundown {
        Rundown::from_entries(entries, 50).unwrap()
    }

    #[test]
    fn idle_cursor_never_resyncs() {
        let rundown = rundown(vec![event("a", false)]);
        let idle = PlaybackCursor::idle();

        assert!(!decide_resync(&idle, &rundown, &AffectedIds::Untracked));
        assert!(!decide_resync(&idle, &rundown, &AffectedIds::one("a")));
    }

    #[test]
    fn untracked_mutation_resyncs() {
        let rundown = rundown(vec![event("a", false), event("b", false)]);
        assert_eq!(
            resync_reason(&cursor("a", "b"), &rundown, &AffectedIds::Untracked),
            ResyncReason::Untracked
        );
    }

    #[test]
    fn touching_any_loaded_reference_resyncs() {
        let rundown = rundown(vec![event("a", true), event("b", false), event("c", true)]);
        let mut loaded = cursor("a", "b");
        loaded.selected_public_event_id = Some("a".to_string());
        loaded.next_public_event_id = Some("c".to_string());

        for id in ["a", "b", "c"] {
            assert_eq!(
                resync_reason(&loaded, &rundown, &AffectedIds::one(id)),
                ResyncReason::LoadedEntryAffected,
                "id {id}"
            );
        }
    }

    #[test]
    fn gap_between_now_and_next_resyncs() {
        let rundown = rundown(vec![event("a", false), event("b", false), event("c", false)]);
        assert!(decide_resync(
            &cursor("a", "c"),
            &rundown,
            &AffectedIds::one("zzz")
        ));
    }

    #[test]
    fn non_event_entries_do_not_break_adjacency() {
        let rundown = rundown(vec![
            event("a", false),
            Entry::Block(BlockEntry {
                id: "k".to_string(),
            }),
            event("b", false),
            event("c", false),
        ]);
        assert_eq!(
            resync_reason(&cursor("a", "b"), &rundown, &AffectedIds::one("c")),
            ResyncReason::Unaffected
        );
    }

    #[test]
    fn missing_next_is_treated_as_stale() {
        let rundown = rundown(vec![event("a", false)]);
        let loaded = PlaybackCursor {
            selected_event_id: Some("a".to_string()),
            ..PlaybackCursor::default()
        };
        assert_eq!(
            resync_reason(&loaded, &rundown, &AffectedIds::Ids(Vec::new())),
            ResyncReason::NextStale
        );
    }

    #[test]
    fn new_public_event_before_next_public_resyncs() {
        let rundown = rundown(vec![
            event("a", true),
            event("b", false),
            event("p", true),
            event("c", true),
        ]);
        let mut loaded = cursor("a", "b");
        loaded.selected_public_event_id = Some("a".to_string());
        loaded.next_public_event_id = Some("c".to_string());

        assert_eq!(
            resync_reason(&loaded, &rundown, &AffectedIds::one("x")),
            ResyncReason::PublicNextStale
        );
    }

    #[test]
    fn public_events_after_next_public_are_ignored() {
        let rundown = rundown(vec![
            event("a", true),
            event("b", false),
            event("c", true),
            event("d", true),
        ]);
        let mut loaded = cursor("a", "b");
        loaded.selected_public_event_id = Some("a".to_string());
        loaded.next_public_event_id = Some("c".to_string());

        assert!(!decide_resync(&loaded, &rundown, &AffectedIds::one("d")));
    }
}
