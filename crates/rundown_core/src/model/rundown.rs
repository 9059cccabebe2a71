//! Ordered rundown store.
//!
//! # Responsibility
//! - Own the ordered entry sequence and an id -> position index.
//! - Provide positional insert/update/delete/reorder/replace operations.
//! - Report the ids every mutation touched, for timer resync decisions.
//!
//! # Invariants
//! - Entry ids are unique within the sequence.
//! - `len() <= max_events()` after every successful mutation.
//! - `positions[entries[i].id] == i` for every `i`.
//! - A failed operation leaves the store untouched.

use crate::model::entry::{
    Entry, EntryId, EntryKind, EntryPatch, EntryValidationError, EventEntry,
};
use crate::model::id::generate_id;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from rundown store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The rundown already holds `max` entries.
    CapacityExceeded { max: usize },
    /// Referenced entry id does not exist.
    NotFound(EntryId),
    /// Entry at `expected_index` is not `id`; the caller's view is stale.
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
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded { max } => {
                write!(f, "reached limit number of {max} entries")
            }
            Self::NotFound(id) => write!(f, "entry not found: {id}"),
            Self::IndexMismatch {
                id,
                expected_index,
                actual_index,
            } => match actual_index {
                Some(actual) => write!(
                    f,
                    "entry {id} expected at index {expected_index}, found at {actual}"
                ),
                None => write!(f, "entry {id} expected at index {expected_index}, not found"),
            },
            Self::InvalidEntryType {
                id,
                expected,
                actual,
            } => write!(f, "entry {id} is a {actual}, expected a {expected}"),
            Self::DuplicateId(id) => write!(f, "duplicate entry id: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntryValidationError> for StoreError {
    fn from(value: EntryValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Ids touched by one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffectedIds {
    /// Structural change whose impact is not tracked (clear, bulk replace).
    Untracked,
    /// The exact ids the mutation touched.
    Ids(Vec<EntryId>),
}

impl AffectedIds {
    pub fn one(id: impl Into<EntryId>) -> Self {
        Self::Ids(vec![id.into()])
    }

    pub fn ids(&self) -> Option<&[EntryId]> {
        match self {
            Self::Untracked => None,
            Self::Ids(ids) => Some(ids.as_slice()),
        }
    }

    /// Whether `id` is listed. Always `false` for `Untracked`.
    pub fn contains(&self, id: &str) -> bool {
        self.ids()
            .is_some_and(|ids| ids.iter().any(|value| value == id))
    }

    /// Number of listed ids, or `None` when untracked.
    pub fn count(&self) -> Option<usize> {
        self.ids().map(<[EntryId]>::len)
    }
}

/// Outcome of a mutation centred on one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    /// The entry after the change; the removed entry for deletes.
    pub entry: Entry,
    pub affected: AffectedIds,
}

impl EntryChange {
    fn touched(entry: Entry) -> Self {
        let affected = AffectedIds::one(entry.id());
        Self { entry, affected }
    }
}

/// In-memory ordered rundown.
#[derive(Debug, Clone)]
pub struct Rundown {
    entries: Vec<Entry>,
    positions: HashMap<EntryId, usize>,
    max_events: usize,
}

impl Rundown {
    /// Creates an empty rundown capped at `max_events` entries.
    pub fn new(max_events: usize) -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            max_events,
        }
    }

    /// Builds a rundown from an ordered sequence.
    ///
    /// # Errors
    /// - `CapacityExceeded` when `entries` is longer than `max_events`.
    /// - `DuplicateId` / `Validation` for structurally invalid input.
    pub fn from_entries(entries: Vec<Entry>, max_events: usize) -> StoreResult<Self> {
        let mut rundown = Self::new(max_events);
        rundown.replace_all(entries)?;
        Ok(rundown)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.position(id).map(|index| &self.entries[index])
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Events only, in rundown order.
    pub fn timed_events(&self) -> impl Iterator<Item = &EventEntry> + '_ {
        self.entries.iter().filter_map(Entry::as_event)
    }

    /// Inserts `entry` at `position` (clamped to the end).
    ///
    /// A colliding id is replaced by a fresh one.
    pub fn insert_at(&mut self, entry: Entry, position: usize) -> StoreResult<EntryChange> {
        self.ensure_capacity()?;
        entry.validate()?;
        let entry = self.with_unique_id(entry);
        let position = position.min(self.entries.len());

        self.entries.insert(position, entry.clone());
        self.reindex_from(position);
        Ok(EntryChange::touched(entry))
    }

    /// Inserts `entry` right after `after_id`, or at the head when `None`.
    pub fn insert_after_id(
        &mut self,
        entry: Entry,
        after_id: Option<&str>,
    ) -> StoreResult<EntryChange> {
        let position = match after_id {
            None => 0,
            Some(after_id) => {
                self.position(after_id)
                    .ok_or_else(|| StoreError::NotFound(after_id.to_string()))?
                    + 1
            }
        };
        self.insert_at(entry, position)
    }

    /// Merges `patch` into the entry with `id`.
    pub fn update_by_id(&mut self, id: &str, patch: EntryPatch) -> StoreResult<EntryChange> {
        let index = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = self.entries[index].clone();
        updated
            .apply_patch(patch)
            .map_err(|mismatch| StoreError::InvalidEntryType {
                id: id.to_string(),
                expected: mismatch.patch,
                actual: mismatch.entry,
            })?;

        self.entries[index] = updated.clone();
        Ok(EntryChange::touched(updated))
    }

    /// Removes the entry with `id`.
    ///
    /// # Errors
    /// - `NotFound` when `id` is absent; deleting is not silently idempotent.
    pub fn delete_by_id(&mut self, id: &str) -> StoreResult<EntryChange> {
        let index = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let removed = self.entries.remove(index);
        self.positions.remove(removed.id());
        self.reindex_from(index);
        Ok(EntryChange::touched(removed))
    }

    pub fn clear(&mut self) -> AffectedIds {
        self.entries.clear();
        self.positions.clear();
        AffectedIds::Untracked
    }

    /// Moves `id` from `from` to `to` (clamped), keeping all other relative order.
    ///
    /// `from == to` is a no-op that reports no affected ids.
    pub fn reorder(&mut self, id: &str, from: usize, to: usize) -> StoreResult<EntryChange> {
        let actual_index = self.position(id);
        if actual_index != Some(from) {
            return Err(StoreError::IndexMismatch {
                id: id.to_string(),
                expected_index: from,
                actual_index,
            });
        }

        if from == to {
            return Ok(EntryChange {
                entry: self.entries[from].clone(),
                affected: AffectedIds::Ids(Vec::new()),
            });
        }

        let moved = self.entries.remove(from);
        let to = to.min(self.entries.len());
        self.entries.insert(to, moved.clone());
        self.reindex_from(from.min(to));
        Ok(EntryChange::touched(moved))
    }

    /// Replaces the whole sequence atomically.
    pub fn replace_all(&mut self, entries: Vec<Entry>) -> StoreResult<AffectedIds> {
        if entries.len() > self.max_events {
            return Err(StoreError::CapacityExceeded {
                max: self.max_events,
            });
        }

        let mut positions = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            entry.validate()?;
            if positions.insert(entry.id().to_string(), index).is_some() {
                return Err(StoreError::DuplicateId(entry.id().to_string()));
            }
        }

        self.entries = entries;
        self.positions = positions;
        Ok(AffectedIds::Untracked)
    }

    fn ensure_capacity(&self) -> StoreResult<()> {
        if self.entries.len() >= self.max_events {
            return Err(StoreError::CapacityExceeded {
                max: self.max_events,
            });
        }
        Ok(())
    }

    fn with_unique_id(&self, mut entry: Entry) -> Entry {
        while self.contains(entry.id()) {
            entry.set_id(generate_id());
        }
        entry
    }

    fn reindex_from(&mut self, start: usize) {
        for (index, entry) in self.entries.iter().enumerate().skip(start) {
            self.positions.insert(entry.id().to_string(), index);
        }
    }
}
