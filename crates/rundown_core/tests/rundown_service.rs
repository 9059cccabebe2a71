use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rundown_core::db::{open_db, open_db_in_memory};
use rundown_core::{
    BlockDraft, DelayDraft, DelayPatch, Entry, EntryDraft, EntryKind, EntryPatch, EventDraft,
    EventEntry, EventPatch, InsertPosition, PlaybackCursor, RepoError, RepoResult, RundownConfig,
    RundownError, RundownRepository, RundownService, SharedCursor, SqliteRundownRepository,
    TimerSync,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Default)]
struct RecordingTimer {
    calls: Mutex<Vec<String>>,
}

impl RecordingTimer {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock())
    }
}

impl TimerSync for RecordingTimer {
    fn sync_loaded(&self, now_id: &str) {
        self.calls.lock().push(now_id.to_string());
    }
}

type SelfEditingService =
    RundownService<SqliteRundownRepository, PlaybackCursor, Arc<SelfEditingTimer>>;

/// Timer that edits the rundown from inside its first reload.
#[derive(Default)]
struct SelfEditingTimer {
    service: OnceCell<Weak<SelfEditingService>>,
    fired: AtomicBool,
}

impl TimerSync for SelfEditingTimer {
    fn sync_loaded(&self, _now_id: &str) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(service) = self.service.get().and_then(Weak::upgrade) {
            service
                .edit_event(
                    "c",
                    EntryPatch::Event(EventPatch {
                        title: Some("edited by timer".to_string()),
                        ..EventPatch::default()
                    }),
                )
                .unwrap();
        }
    }
}

/// Repository whose writes can be switched to fail.
struct FlakyRepo {
    inner: SqliteRundownRepository,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyRepo {
    fn check(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl RundownRepository for FlakyRepo {
    fn get_rundown(&self) -> RepoResult<Vec<Entry>> {
        self.inner.get_rundown()
    }

    fn set_rundown(&self, entries: &[Entry]) -> RepoResult<()> {
        self.check()?;
        self.inner.set_rundown(entries)
    }

    fn insert_entry_at(&self, entry: &Entry, position: usize) -> RepoResult<()> {
        self.check()?;
        self.inner.insert_entry_at(entry, position)
    }

    fn insert_entry_after_id(&self, entry: &Entry, after_id: &str) -> RepoResult<()> {
        self.check()?;
        self.inner.insert_entry_after_id(entry, after_id)
    }

    fn update_entry_by_id(&self, id: &str, entry: &Entry) -> RepoResult<()> {
        self.check()?;
        self.inner.update_entry_by_id(id, entry)
    }

    fn delete_entry(&self, id: &str) -> RepoResult<()> {
        self.check()?;
        self.inner.delete_entry(id)
    }

    fn clear_rundown(&self) -> RepoResult<()> {
        self.check()?;
        self.inner.clear_rundown()
    }

    fn get_entry_by_id(&self, id: &str) -> RepoResult<Option<Entry>> {
        self.inner.get_entry_by_id(id)
    }

    fn rundown_len(&self) -> RepoResult<usize> {
        self.inner.rundown_len()
    }
}

type TestService = RundownService<SqliteRundownRepository, SharedCursor, Arc<RecordingTimer>>;

struct Fixture {
    _dir: tempfile::TempDir,
    path: std::path::PathBuf,
    cursor: SharedCursor,
    timer: Arc<RecordingTimer>,
    service: TestService,
}

fn fixture(seed: &[Entry], max_events: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rundown.db");
    let repo = SqliteRundownRepository::try_new(open_db(&path).unwrap()).unwrap();
    repo.set_rundown(seed).unwrap();

    let cursor = SharedCursor::default();
    let timer = Arc::new(RecordingTimer::default());
    let service = RundownService::load(
        repo,
        cursor.clone(),
        Arc::clone(&timer),
        &RundownConfig { max_events },
    )
    .unwrap();

    Fixture {
        _dir: dir,
        path,
        cursor,
        timer,
        service,
    }
}

fn persisted(path: &Path) -> Vec<Entry> {
    SqliteRundownRepository::try_new(open_db(path).unwrap())
        .unwrap()
        .get_rundown()
        .unwrap()
}

fn timed(id: &str, start: i64, end: i64) -> Entry {
    let mut event = EventEntry::with_id(id);
    event.time_start = start;
    event.time_end = end;
    Entry::Event(event)
}

fn public(id: &str, is_public: bool) -> Entry {
    let mut event = EventEntry::with_id(id);
    event.is_public = is_public;
    Entry::Event(event)
}

fn event_draft(id: Option<&str>) -> EntryDraft {
    EntryDraft::Event(EventDraft {
        id: id.map(str::to_string),
        ..EventDraft::default()
    })
}

fn ids(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(Entry::id).collect()
}

fn now_next(now: &str, next: &str) -> PlaybackCursor {
    PlaybackCursor {
        selected_event_id: Some(now.to_string()),
        next_event_id: Some(next.to_string()),
        ..PlaybackCursor::default()
    }
}

#[test]
fn add_event_places_entries_and_persists_them() {
    let fx = fixture(&[timed("a", 0, 1)], 10);

    fx.service
        .add_event(event_draft(Some("head")), InsertPosition::Head)
        .unwrap();
    fx.service
        .add_event(
            EntryDraft::Block(BlockDraft::default()),
            InsertPosition::After("a".to_string()),
        )
        .unwrap();

    let rundown = fx.service.rundown();
    assert_eq!(rundown.len(), 3);
    assert_eq!(rundown[0].id(), "head");
    assert_eq!(rundown[1].id(), "a");
    assert_eq!(rundown[2].kind(), EntryKind::Block);
    assert_eq!(persisted(&fx.path), rundown);
}

#[test]
fn add_event_never_duplicates_ids() {
    let fx = fixture(&[], 50);

    for _ in 0..5 {
        fx.service
            .add_event(event_draft(None), InsertPosition::Head)
            .unwrap();
    }
    let added = fx
        .service
        .add_event(event_draft(Some("fixed")), InsertPosition::Head)
        .unwrap();
    let collided = fx
        .service
        .add_event(event_draft(Some("fixed")), InsertPosition::Head)
        .unwrap();

    assert_eq!(added.id(), "fixed");
    assert_ne!(collided.id(), "fixed");

    let rundown = fx.service.rundown();
    let unique: HashSet<&str> = rundown.iter().map(Entry::id).collect();
    assert_eq!(unique.len(), rundown.len());
    assert_eq!(persisted(&fx.path).len(), 7);
}

#[test]
fn add_event_at_capacity_fails_without_changes() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2)], 2);

    let err = fx
        .service
        .add_event(event_draft(None), InsertPosition::Head)
        .unwrap_err();

    assert!(matches!(err, RundownError::CapacityExceeded { max: 2 }));
    assert_eq!(err.code(), "capacity_exceeded");
    assert_eq!(ids(&fx.service.rundown()), vec!["a", "b"]);
    assert_eq!(ids(&persisted(&fx.path)), vec!["a", "b"]);
}

#[test]
fn add_event_after_missing_anchor_is_not_found() {
    let fx = fixture(&[timed("a", 0, 1)], 10);

    let err = fx
        .service
        .add_event(event_draft(None), InsertPosition::After("ghost".to_string()))
        .unwrap_err();

    assert!(matches!(err, RundownError::NotFound(ref id) if id == "ghost"));
    assert_eq!(fx.service.len(), 1);
}

#[test]
fn edit_event_merges_patch_and_bumps_revision() {
    let fx = fixture(&[timed("a", 0, 100)], 10);

    let edited = fx
        .service
        .edit_event(
            "a",
            EntryPatch::Event(EventPatch {
                title: Some("Opening".to_string()),
                time_end: Some(200),
                ..EventPatch::default()
            }),
        )
        .unwrap();

    let event = edited.as_event().unwrap();
    assert_eq!(event.title, "Opening");
    assert_eq!((event.time_start, event.time_end), (0, 200));
    assert_eq!(event.revision, 1);
    assert_eq!(fx.service.get_entry("a"), Some(edited.clone()));
    assert_eq!(persisted(&fx.path), vec![edited]);
}

#[test]
fn edit_event_with_wrong_patch_kind_is_rejected() {
    let fx = fixture(&[timed("a", 0, 100)], 10);

    let err = fx
        .service
        .edit_event(
            "a",
            EntryPatch::Delay(DelayPatch {
                duration: Some(5),
            }),
        )
        .unwrap_err();

    assert_eq!(err.code(), "invalid_entry_type");
    assert_eq!(fx.service.rundown(), vec![timed("a", 0, 100)]);
}

#[test]
fn delete_event_removes_entry_and_rejects_unknown_id() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2)], 10);

    fx.service.delete_event("a").unwrap();
    assert_eq!(ids(&persisted(&fx.path)), vec!["b"]);

    let err = fx.service.delete_event("a").unwrap_err();
    assert_eq!(err.code(), "not_found");
    assert!(err.to_string().contains('a'));
}

#[test]
fn delete_all_events_empties_rundown() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2)], 10);

    fx.service.delete_all_events().unwrap();

    assert!(fx.service.is_empty());
    assert!(persisted(&fx.path).is_empty());
}

#[test]
fn reorder_followed_by_inverse_restores_order() {
    let seed = vec![timed("a", 0, 1), timed("b", 1, 2), timed("c", 2, 3), timed("d", 3, 4)];
    let fx = fixture(&seed, 10);

    fx.service.reorder_event("a", 0, 2).unwrap();
    assert_eq!(ids(&fx.service.rundown()), vec!["b", "c", "a", "d"]);
    assert_eq!(ids(&persisted(&fx.path)), vec!["b", "c", "a", "d"]);

    fx.service.reorder_event("a", 2, 0).unwrap();
    assert_eq!(fx.service.rundown(), seed);
    assert_eq!(persisted(&fx.path), seed);
}

#[test]
fn reorder_with_stale_index_is_rejected() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2)], 10);

    let err = fx.service.reorder_event("a", 1, 0).unwrap_err();

    match err {
        RundownError::IndexMismatch {
            id,
            expected_index,
            actual_index,
        } => {
            assert_eq!(id, "a");
            assert_eq!(expected_index, 1);
            assert_eq!(actual_index, Some(0));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ids(&fx.service.rundown()), vec!["a", "b"]);
}

#[test]
fn apply_delay_shifts_events_until_block() {
    let delay = Entry::from_draft(EntryDraft::Delay(DelayDraft {
        id: Some("d".to_string()),
        duration: Some(300),
    }));
    let block = Entry::from_draft(EntryDraft::Block(BlockDraft {
        id: Some("k".to_string()),
    }));
    let fx = fixture(
        &[delay, timed("a", 0, 100), timed("b", 100, 200), block, timed("c", 200, 300)],
        10,
    );

    fx.service.apply_delay("d").unwrap();

    let timing: Vec<(String, i64, i64, u32)> = fx
        .service
        .timed_events()
        .into_iter()
        .map(|event| (event.id, event.time_start, event.time_end, event.revision))
        .collect();
    assert_eq!(
        timing,
        vec![
            ("a".to_string(), 300, 400, 1),
            ("b".to_string(), 400, 500, 1),
            ("c".to_string(), 200, 300, 0),
        ]
    );
    assert_eq!(fx.service.len(), 3);
    assert_eq!(persisted(&fx.path), fx.service.rundown());
}

#[test]
fn apply_delay_with_zero_duration_bumps_revision_only() {
    let delay = Entry::from_draft(EntryDraft::Delay(DelayDraft {
        id: Some("d".to_string()),
        duration: Some(0),
    }));
    let fx = fixture(&[delay, timed("a", 10, 20)], 10);

    fx.service.apply_delay("d").unwrap();

    let events = fx.service.timed_events();
    assert_eq!(events.len(), 1);
    assert_eq!((events[0].time_start, events[0].time_end), (10, 20));
    assert_eq!(events[0].revision, 1);
}

#[test]
fn apply_delay_on_event_is_invalid_entry_type() {
    let fx = fixture(&[timed("a", 0, 1)], 10);

    let err = fx.service.apply_delay("a").unwrap_err();
    assert!(matches!(
        err,
        RundownError::InvalidEntryType {
            expected: EntryKind::Delay,
            actual: EntryKind::Event,
            ..
        }
    ));

    let missing = fx.service.apply_delay("ghost").unwrap_err();
    assert_eq!(missing.code(), "not_found");
}

#[test]
fn clone_event_inserts_copy_after_source() {
    let mut source = EventEntry::with_id("a");
    source.title = "Talk".to_string();
    source.revision = 3;
    let fx = fixture(&[Entry::Event(source), timed("b", 0, 1)], 10);

    let copy = fx.service.clone_event("a").unwrap();

    let copy_event = copy.as_event().unwrap();
    assert_ne!(copy.id(), "a");
    assert_eq!(copy_event.title, "Talk");
    assert_eq!(copy_event.revision, 0);
    assert_eq!(ids(&fx.service.rundown()), vec!["a", copy.id(), "b"]);
    assert_eq!(persisted(&fx.path), fx.service.rundown());
}

#[test]
fn import_rundown_replaces_content() {
    let fx = fixture(&[timed("old", 0, 1)], 10);

    let count = fx
        .service
        .import_rundown(
            r#"{"rundown": [
                {"type": "event", "id": "e1", "title": "Doors"},
                {"type": "delay", "duration": 60000},
                {"type": "block"}
            ]}"#,
        )
        .unwrap();

    assert_eq!(count, 3);
    assert!(fx.service.get_entry("old").is_none());
    assert_eq!(persisted(&fx.path), fx.service.rundown());

    let err = fx.service.import_rundown("{ broken").unwrap_err();
    assert_eq!(err.code(), "invalid_import");
    assert_eq!(fx.service.len(), 3);
}

#[test]
fn idle_cursor_never_triggers_timer_sync() {
    let fx = fixture(&[timed("a", 0, 1)], 10);

    fx.service
        .edit_event("a", EntryPatch::Event(EventPatch::default()))
        .unwrap();
    fx.service.delete_all_events().unwrap();

    assert!(fx.timer.take().is_empty());
}

#[test]
fn editing_loaded_event_triggers_timer_sync() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2), timed("c", 2, 3)], 10);
    fx.cursor.set(now_next("a", "b"));

    fx.service
        .edit_event("b", EntryPatch::Event(EventPatch::default()))
        .unwrap();

    assert_eq!(fx.timer.take(), vec!["a".to_string()]);
}

#[test]
fn unrelated_edit_with_adjacent_next_skips_timer_sync() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2), timed("c", 2, 3)], 10);
    fx.cursor.set(now_next("a", "b"));

    fx.service
        .edit_event("c", EntryPatch::Event(EventPatch::default()))
        .unwrap();

    assert!(fx.timer.take().is_empty());
}

#[test]
fn inserting_between_now_and_next_triggers_timer_sync() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2)], 10);
    fx.cursor.set(now_next("a", "b"));

    fx.service
        .add_event(event_draft(Some("x")), InsertPosition::After("a".to_string()))
        .unwrap();

    assert_eq!(fx.timer.take(), vec!["a".to_string()]);
}

#[test]
fn new_public_event_between_public_pair_triggers_timer_sync() {
    let fx = fixture(
        &[public("a", true), public("b", false), public("c", false), public("d", true)],
        10,
    );
    fx.cursor.set(PlaybackCursor {
        selected_event_id: Some("a".to_string()),
        next_event_id: Some("b".to_string()),
        selected_public_event_id: Some("a".to_string()),
        next_public_event_id: Some("d".to_string()),
    });

    fx.service
        .edit_event(
            "c",
            EntryPatch::Event(EventPatch {
                title: Some("retitled".to_string()),
                ..EventPatch::default()
            }),
        )
        .unwrap();
    assert!(fx.timer.take().is_empty());

    fx.service
        .add_event(
            EntryDraft::Event(EventDraft {
                id: Some("p".to_string()),
                is_public: Some(true),
                ..EventDraft::default()
            }),
            InsertPosition::After("c".to_string()),
        )
        .unwrap();
    assert_eq!(fx.timer.take(), vec!["a".to_string()]);
}

#[test]
fn untracked_mutation_triggers_timer_sync() {
    let fx = fixture(&[timed("a", 0, 1), timed("b", 1, 2)], 10);
    fx.cursor.set(now_next("a", "b"));

    fx.service.import_rundown(r#"[{"type": "event", "id": "a"}]"#).unwrap();

    assert_eq!(fx.timer.take(), vec!["a".to_string()]);
}

#[test]
fn timer_may_edit_rundown_during_reload() {
    let repo = SqliteRundownRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    repo.set_rundown(&[timed("a", 0, 1), timed("b", 1, 2), timed("c", 2, 3)])
        .unwrap();
    let timer = Arc::new(SelfEditingTimer::default());
    let service = Arc::new(
        RundownService::load(
            repo,
            now_next("a", "b"),
            Arc::clone(&timer),
            &RundownConfig::default(),
        )
        .unwrap(),
    );
    timer.service.set(Arc::downgrade(&service)).unwrap();

    service
        .edit_event("a", EntryPatch::Event(EventPatch::default()))
        .unwrap();

    assert!(timer.fired.load(Ordering::SeqCst));
    let edited = service.get_entry("c").unwrap();
    assert_eq!(edited.as_event().unwrap().title, "edited by timer");
}

#[test]
fn failed_persistence_leaves_memory_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let inner = SqliteRundownRepository::try_new(conn).unwrap();
    inner
        .set_rundown(&[timed("a", 0, 1), timed("b", 1, 2)])
        .unwrap();
    let fail_writes = Arc::new(AtomicBool::new(false));
    let timer = Arc::new(RecordingTimer::default());
    let service = RundownService::load(
        FlakyRepo {
            inner,
            fail_writes: Arc::clone(&fail_writes),
        },
        now_next("a", "b"),
        Arc::clone(&timer),
        &RundownConfig::default(),
    )
    .unwrap();
    let before = service.rundown();

    fail_writes.store(true, Ordering::SeqCst);
    let err = service.reorder_event("a", 0, 1).unwrap_err();
    assert_eq!(err.code(), "persistence_failed");
    assert!(service.delete_event("a").is_err());
    assert!(service.delete_all_events().is_err());

    assert_eq!(service.rundown(), before);
    assert!(timer.take().is_empty());

    fail_writes.store(false, Ordering::SeqCst);
    service.reorder_event("a", 0, 1).unwrap();
    assert_eq!(ids(&service.rundown()), vec!["b", "a"]);
}

#[test]
fn load_rejects_stored_rundown_over_capacity() {
    let repo = SqliteRundownRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    repo.set_rundown(&[timed("a", 0, 1), timed("b", 1, 2)]).unwrap();

    let result = RundownService::load(
        repo,
        PlaybackCursor::idle(),
        Arc::new(RecordingTimer::default()),
        &RundownConfig { max_events: 1 },
    );

    assert!(matches!(
        result,
        Err(RundownError::CapacityExceeded { max: 1 })
    ));
}
