//! Rundown use-case service.
//!
//! # Responsibility
//! - Expose the rundown edit operations (add/edit/delete/reorder/apply-delay).
//! - Serialize writers, persist each mutation, then ask the decider whether
//!   the running timer must reload.
//!
//! # Invariants
//! - The repository lock is the single write gate; at most one mutation runs
//!   at a time.
//! - A mutation runs on a working copy that is published only after the
//!   repository accepted it, so readers never see a partial splice and a
//!   failed write leaves both memory and storage unchanged.
//! - The cursor is only read, never written.
//! - The timer is called after the write gate is released, so a timer may
//!   call back into the service.

use crate::config::RundownConfig;
use crate::model::delay;
use crate::model::entry::{
    Entry, EntryDraft, EntryId, EntryKind, EntryPatch, EntryValidationError, EventEntry,
};
use crate::model::id::generate_id;
use crate::model::rundown::{AffectedIds, Rundown, StoreError};
use crate::repo::rundown_repo::{RepoError, RundownRepository};
use crate::service::import::{parse_rundown_str, ImportError};
use crate::sync::cursor::CursorSource;
use crate::sync::decider::resync_reason;
use crate::sync::timer::TimerSync;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors surfaced to callers of the rundown service.
#[derive(Debug)]
pub enum RundownError {
    /// The rundown already holds the configured maximum.
    CapacityExceeded { max: usize },
    /// Referenced entry id does not exist.
    NotFound(EntryId),
    /// Reorder source index does not hold the given id.
    IndexMismatch {
        id: EntryId,
        expected_index: usize,
        actual_index: Option<usize>,
    },
    /// Operation expected another entry kind.
    InvalidEntryType {
        id: EntryId,
        expected: EntryKind,
        actual: EntryKind,
    },
    /// Bulk input repeats an id.
    DuplicateId(EntryId),
    /// Entry failed structural validation.
    Validation(EntryValidationError),
    /// Import data could not be read.
    Import(ImportError),
    /// Persistence failure.
    Repo(RepoError),
}

impl RundownError {
    /// Stable machine-readable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotFound(_) => "not_found",
            Self::IndexMismatch { .. } => "index_mismatch",
            Self::InvalidEntryType { .. } => "invalid_entry_type",
            Self::DuplicateId(_) => "duplicate_id",
            Self::Validation(_) => "invalid_entry",
            Self::Import(_) => "invalid_import",
            Self::Repo(_) => "persistence_failed",
        }
    }
}

impl Display for RundownError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded { max } => write!(f, "reached limit number of {max} events"),
            Self::NotFound(id) => write!(f, "no entry with id {id}"),
            Self::IndexMismatch {
                id,
                expected_index,
                actual_index,
            } => match actual_index {
                Some(actual) => write!(
                    f,
                    "id {id} not found at index {expected_index} (currently at {actual})"
                ),
                None => write!(f, "id {id} not found at index {expected_index}"),
            },
            Self::InvalidEntryType {
                id,
                expected,
                actual,
            } => write!(f, "entry {id} is a {actual}, expected a {expected}"),
            Self::DuplicateId(id) => write!(f, "duplicate entry id: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RundownError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RundownError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::CapacityExceeded { max } => Self::CapacityExceeded { max },
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::IndexMismatch {
                id,
                expected_index,
                actual_index,
            } => Self::IndexMismatch {
                id,
                expected_index,
                actual_index,
            },
            StoreError::InvalidEntryType {
                id,
                expected,
                actual,
            } => Self::InvalidEntryType {
                id,
                expected,
                actual,
            },
            StoreError::DuplicateId(id) => Self::DuplicateId(id),
            StoreError::Validation(err) => Self::Validation(err),
        }
    }
}

impl From<RepoError> for RundownError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ImportError> for RundownError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

/// Where `add_event` places the new entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InsertPosition {
    /// Front of the rundown.
    #[default]
    Head,
    /// Immediately after the entry with this id.
    After(EntryId),
}

/// Rundown service facade.
pub struct RundownService<R, C, T> {
    repo: Mutex<R>,
    rundown: RwLock<Rundown>,
    cursor: C,
    timer: T,
}

impl<R, C, T> RundownService<R, C, T>
where
    R: RundownRepository,
    C: CursorSource,
    T: TimerSync,
{
    /// Loads the persisted rundown and builds the service around it.
    ///
    /// # Errors
    /// - `Repo` when the rundown cannot be read.
    /// - `CapacityExceeded` / `DuplicateId` / `Validation` when stored data
    ///   violates the store invariants under `config`.
    pub fn load(
        repo: R,
        cursor: C,
        timer: T,
        config: &RundownConfig,
    ) -> Result<Self, RundownError> {
        let entries = repo.get_rundown()?;
        let rundown = Rundown::from_entries(entries, config.max_events)?;
        info!(
            "event=rundown_load module=service status=ok entries={} max_events={}",
            rundown.len(),
            rundown.max_events()
        );

        Ok(Self {
            repo: Mutex::new(repo),
            rundown: RwLock::new(rundown),
            cursor,
            timer,
        })
    }

    /// Snapshot of the whole sequence.
    pub fn rundown(&self) -> Vec<Entry> {
        self.rundown.read().entries().to_vec()
    }

    pub fn get_entry(&self, id: &str) -> Option<Entry> {
        self.rundown.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rundown.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rundown.read().is_empty()
    }

    /// Snapshot of the events only, in order.
    pub fn timed_events(&self) -> Vec<EventEntry> {
        self.rundown.read().timed_events().cloned().collect()
    }

    /// Creates an entry from `draft` at `position`.
    ///
    /// # Errors
    /// - `CapacityExceeded` when the rundown is full.
    /// - `NotFound` when the `After` anchor does not exist.
    pub fn add_event(
        &self,
        draft: EntryDraft,
        position: InsertPosition,
    ) -> Result<Entry, RundownError> {
        let entry = Entry::from_draft(draft);
        self.mutate("add_event", |rundown, repo| {
            let change = match &position {
                InsertPosition::Head => rundown.insert_at(entry, 0)?,
                InsertPosition::After(after_id) => {
                    rundown.insert_after_id(entry, Some(after_id.as_str()))?
                }
            };
            match &position {
                InsertPosition::Head => repo.insert_entry_at(&change.entry, 0)?,
                InsertPosition::After(after_id) => {
                    repo.insert_entry_after_id(&change.entry, after_id)?
                }
            }
            Ok((change.entry, change.affected))
        })
    }

    /// Merges `patch` into entry `id`.
    pub fn edit_event(&self, id: &str, patch: EntryPatch) -> Result<Entry, RundownError> {
        self.mutate("edit_event", |rundown, repo| {
            let change = rundown.update_by_id(id, patch)?;
            repo.update_entry_by_id(id, &change.entry)?;
            Ok((change.entry, change.affected))
        })
    }

    /// Removes entry `id`. Unknown ids fail with `NotFound`.
    pub fn delete_event(&self, id: &str) -> Result<(), RundownError> {
        self.mutate("delete_event", |rundown, repo| {
            let change = rundown.delete_by_id(id)?;
            repo.delete_entry(id)?;
            Ok(((), change.affected))
        })
    }

    /// Removes every entry.
    pub fn delete_all_events(&self) -> Result<(), RundownError> {
        self.mutate("delete_all_events", |rundown, repo| {
            let affected = rundown.clear();
            repo.clear_rundown()?;
            Ok(((), affected))
        })
    }

    /// Moves entry `id` from index `from` to index `to`.
    ///
    /// # Errors
    /// - `IndexMismatch` when the entry at `from` is not `id`.
    pub fn reorder_event(&self, id: &str, from: usize, to: usize) -> Result<Entry, RundownError> {
        self.mutate("reorder_event", |rundown, repo| {
            let change = rundown.reorder(id, from, to)?;
            if from != to {
                repo.set_rundown(rundown.entries())?;
            }
            Ok((change.entry, change.affected))
        })
    }

    /// Folds delay `delay_id` into the following events and removes it.
    ///
    /// # Errors
    /// - `NotFound` when `delay_id` is absent.
    /// - `InvalidEntryType` when `delay_id` is not a delay.
    pub fn apply_delay(&self, delay_id: &str) -> Result<(), RundownError> {
        self.mutate("apply_delay", |rundown, repo| {
            let affected = delay::apply_delay(rundown, delay_id)?;
            repo.set_rundown(rundown.entries())?;
            Ok(((), affected))
        })
    }

    /// Inserts a copy of event `id` right after it, with a fresh id and
    /// revision 0.
    pub fn clone_event(&self, id: &str) -> Result<Entry, RundownError> {
        self.mutate("clone_event", |rundown, repo| {
            let source = rundown
                .get(id)
                .ok_or_else(|| RundownError::NotFound(id.to_string()))?;
            let Entry::Event(source) = source else {
                return Err(RundownError::InvalidEntryType {
                    id: id.to_string(),
                    expected: EntryKind::Event,
                    actual: source.kind(),
                });
            };

            let copy = Entry::Event(EventEntry {
                id: generate_id(),
                revision: 0,
                ..source.clone()
            });
            let change = rundown.insert_after_id(copy, Some(id))?;
            repo.insert_entry_after_id(&change.entry, id)?;
            Ok((change.entry, change.affected))
        })
    }

    /// Replaces the whole rundown with imported JSON. Returns the entry count.
    pub fn import_rundown(&self, raw: &str) -> Result<usize, RundownError> {
        self.mutate("import_rundown", |rundown, repo| {
            let entries = parse_rundown_str(raw, rundown.max_events())?;
            let affected = rundown.replace_all(entries)?;
            repo.set_rundown(rundown.entries())?;
            Ok((rundown.len(), affected))
        })
    }

    /// Runs one serialized mutation and publishes it when it fully succeeds.
    fn mutate<O, F>(&self, op: &'static str, apply: F) -> Result<O, RundownError>
    where
        F: FnOnce(&mut Rundown, &R) -> Result<(O, AffectedIds), RundownError>,
    {
        let started_at = Instant::now();
        let repo = self.repo.lock();
        let mut working = self.rundown.read().clone();

        let (output, affected) = match apply(&mut working, &*repo) {
            Ok(result) => result,
            Err(err) => {
                error!(
                    "event=rundown_mutation module=service status=error op={op} duration_ms={} error_code={} error={err}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                return Err(err);
            }
        };

        *self.rundown.write() = working;
        info!(
            "event=rundown_mutation module=service status=ok op={op} duration_ms={} affected={}",
            started_at.elapsed().as_millis(),
            affected
                .count()
                .map_or_else(|| "untracked".to_string(), |count| count.to_string())
        );

        let resync = self.resync_target(op, &affected);
        drop(repo);

        if let Some(now_id) = resync {
            self.timer.sync_loaded(&now_id);
        }
        Ok(output)
    }

    /// Returns the running entry id when the decider says the timer's loaded
    /// view is stale after this mutation.
    fn resync_target(&self, op: &'static str, affected: &AffectedIds) -> Option<EntryId> {
        let cursor = self.cursor.cursor();
        let reason = resync_reason(&cursor, &self.rundown.read(), affected);
        debug!(
            "event=timer_resync module=service op={op} resync={} reason={}",
            reason.requires_resync(),
            reason.as_str()
        );

        if !reason.requires_resync() {
            return None;
        }
        cursor.selected_event_id
    }
}
