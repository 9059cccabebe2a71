//! Rundown entry definitions.
//!
//! # Responsibility
//! - Define the canonical shape of the three entry kinds: `event`, `delay`, `block`.
//! - Provide typed drafts (creation) and patches (edit) that enumerate the
//!   allowed fields per kind and apply defaults.
//!
//! # Invariants
//! - `id` is stable for the whole entry lifetime; patches never touch it.
//! - The `type` tag of an entry never changes after creation.
//! - Every timing mutation of an event bumps its `revision`.

use crate::model::id::generate_id;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier of a rundown entry.
pub type EntryId = String;

/// Discriminant of a rundown entry, serialized as the `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Timed event shown by the timer.
    Event,
    /// Schedule offset waiting to be folded into following events.
    Delay,
    /// Hard boundary that stops delay propagation.
    Block,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Delay => "delay",
            Self::Block => "block",
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timed event entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub id: EntryId,
    pub title: String,
    pub subtitle: String,
    pub presenter: String,
    pub note: String,
    pub colour: String,
    /// Milliseconds offset of the scheduled start.
    pub time_start: i64,
    /// Milliseconds offset of the scheduled end.
    pub time_end: i64,
    /// Whether the event is shown on audience-facing views.
    pub is_public: bool,
    pub skip: bool,
    /// Monotonic counter, bumped on every edit and applied delay.
    pub revision: u32,
}

impl EventEntry {
    /// Creates an event with default fields and the given id.
    pub fn with_id(id: impl Into<EntryId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            subtitle: String::new(),
            presenter: String::new(),
            note: String::new(),
            colour: String::new(),
            time_start: 0,
            time_end: 0,
            is_public: false,
            skip: false,
            revision: 0,
        }
    }

    /// Moves both schedule bounds by `delta` ms and bumps `revision`.
    ///
    /// A zero `delta` still bumps `revision`.
    pub fn shift(&mut self, delta: i64) {
        self.time_start = self.time_start.saturating_add(delta);
        self.time_end = self.time_end.saturating_add(delta);
        self.bump_revision();
    }

    pub fn bump_revision(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}

/// Delay marker entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayEntry {
    pub id: EntryId,
    /// Signed milliseconds; negative values pull events earlier.
    pub duration: i64,
}

/// Block separator entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub id: EntryId,
}

/// One element of the rundown sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    Event(EventEntry),
    Delay(DelayEntry),
    Block(BlockEntry),
}

impl Entry {
    /// Builds an entry from a typed draft, generating an id when none is supplied.
    pub fn from_draft(draft: EntryDraft) -> Self {
        match draft {
            EntryDraft::Event(draft) => Self::Event(draft.build()),
            EntryDraft::Delay(draft) => Self::Delay(DelayEntry {
                id: resolve_draft_id(draft.id),
                duration: draft.duration.unwrap_or(0),
            }),
            EntryDraft::Block(draft) => Self::Block(BlockEntry {
                id: resolve_draft_id(draft.id),
            }),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Event(event) => event.id.as_str(),
            Self::Delay(delay) => delay.id.as_str(),
            Self::Block(block) => block.id.as_str(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Event(_) => EntryKind::Event,
            Self::Delay(_) => EntryKind::Delay,
            Self::Block(_) => EntryKind::Block,
        }
    }

    pub fn as_event(&self) -> Option<&EventEntry> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Replaces the id. Only the store calls this, before the entry is visible.
    pub(crate) fn set_id(&mut self, id: EntryId) {
        match self {
            Self::Event(event) => event.id = id,
            Self::Delay(delay) => delay.id = id,
            Self::Block(block) => block.id = id,
        }
    }

    /// Validates structural fields.
    ///
    /// # Errors
    /// - `BlankId` when the id is empty after trim.
    /// - `ControlCharacterInId` when the id contains control characters.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        let id = self.id();
        if id.trim().is_empty() {
            return Err(EntryValidationError::BlankId);
        }
        if id.chars().any(char::is_control) {
            return Err(EntryValidationError::ControlCharacterInId(id.to_string()));
        }
        Ok(())
    }

    /// Merges `patch` into this entry, preserving `id` and `type`.
    ///
    /// Events get their `revision` bumped on every successful merge.
    ///
    /// # Errors
    /// Returns the mismatching kinds when the patch targets another entry kind.
    pub fn apply_patch(&mut self, patch: EntryPatch) -> Result<(), PatchKindMismatch> {
        match (self, patch) {
            (Self::Event(event), EntryPatch::Event(patch)) => {
                patch.merge_into(event);
                event.bump_revision();
                Ok(())
            }
            (Self::Delay(delay), EntryPatch::Delay(patch)) => {
                if let Some(duration) = patch.duration {
                    delay.duration = duration;
                }
                Ok(())
            }
            (Self::Block(_), EntryPatch::Block) => Ok(()),
            (entry, patch) => Err(PatchKindMismatch {
                entry: entry.kind(),
                patch: patch.kind(),
            }),
        }
    }
}

/// Structural validation failure for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValidationError {
    BlankId,
    ControlCharacterInId(String),
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "entry id must not be blank"),
            Self::ControlCharacterInId(id) => {
                write!(f, "entry id contains control characters: {id:?}")
            }
        }
    }
}

impl Error for EntryValidationError {}

/// Patch kind does not match the kind of the entry it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchKindMismatch {
    pub entry: EntryKind,
    pub patch: EntryKind,
}

/// Creation input for an `event` entry. Unset fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventDraft {
    #[serde(default)]
    pub id: Option<EntryId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub presenter: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub colour: Option<String>,
    #[serde(default)]
    pub time_start: Option<i64>,
    #[serde(default)]
    pub time_end: Option<i64>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub skip: Option<bool>,
    /// Kept on import so exported rundowns round-trip their counters.
    #[serde(default)]
    pub revision: Option<u32>,
}

impl EventDraft {
    fn build(self) -> EventEntry {
        let mut event = EventEntry::with_id(resolve_draft_id(self.id));
        event.title = self.title.unwrap_or_default();
        event.subtitle = self.subtitle.unwrap_or_default();
        event.presenter = self.presenter.unwrap_or_default();
        event.note = self.note.unwrap_or_default();
        event.colour = self.colour.unwrap_or_default();
        event.time_start = self.time_start.unwrap_or(0);
        event.time_end = self.time_end.unwrap_or(0);
        event.is_public = self.is_public.unwrap_or(false);
        event.skip = self.skip.unwrap_or(false);
        event.revision = self.revision.unwrap_or(0);
        event
    }
}

/// Creation input for a `delay` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayDraft {
    #[serde(default)]
    pub id: Option<EntryId>,
    #[serde(default)]
    pub duration: Option<i64>,
}

/// Creation input for a `block` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDraft {
    #[serde(default)]
    pub id: Option<EntryId>,
}

/// Typed creation input, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryDraft {
    Event(EventDraft),
    Delay(DelayDraft),
    Block(BlockDraft),
}

impl EntryDraft {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Event(_) => EntryKind::Event,
            Self::Delay(_) => EntryKind::Delay,
            Self::Block(_) => EntryKind::Block,
        }
    }
}

/// Edit input for an `event`. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub presenter: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub colour: Option<String>,
    #[serde(default)]
    pub time_start: Option<i64>,
    #[serde(default)]
    pub time_end: Option<i64>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub skip: Option<bool>,
}

impl EventPatch {
    fn merge_into(self, event: &mut EventEntry) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(subtitle) = self.subtitle {
            event.subtitle = subtitle;
        }
        if let Some(presenter) = self.presenter {
            event.presenter = presenter;
        }
        if let Some(note) = self.note {
            event.note = note;
        }
        if let Some(colour) = self.colour {
            event.colour = colour;
        }
        if let Some(time_start) = self.time_start {
            event.time_start = time_start;
        }
        if let Some(time_end) = self.time_end {
            event.time_end = time_end;
        }
        if let Some(is_public) = self.is_public {
            event.is_public = is_public;
        }
        if let Some(skip) = self.skip {
            event.skip = skip;
        }
    }
}

/// Edit input for a `delay`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayPatch {
    #[serde(default)]
    pub duration: Option<i64>,
}

/// Typed edit input, tagged by `type`. Blocks carry no editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryPatch {
    Event(EventPatch),
    Delay(DelayPatch),
    Block,
}

impl EntryPatch {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Event(_) => EntryKind::Event,
            Self::Delay(_) => EntryKind::Delay,
            Self::Block => EntryKind::Block,
        }
    }
}

fn resolve_draft_id(id: Option<EntryId>) -> EntryId {
    id.filter(|value| !value.trim().is_empty())
        .unwrap_or_else(generate_id)
}
