//! Bulk rundown import.
//!
//! Accepts either a bare JSON array of entries or an object with a `rundown`
//! array. Import is lenient per entry and strict per rundown: fields the model
//! does not know are dropped, malformed or colliding entries are skipped with
//! a warning, and the result always satisfies the store invariants.

use crate::model::entry::{BlockDraft, DelayDraft, Entry, EntryDraft, EntryId, EventDraft};
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ImportError {
    Json(serde_json::Error),
    /// Input holds no entry array.
    MissingRundown,
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid rundown json: {err}"),
            Self::MissingRundown => write!(f, "import data has no rundown array"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::MissingRundown => None,
        }
    }
}

/// Exported entry shape. Unlike the edit drafts, unknown keys are ignored so
/// exports carrying extra columns still load.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImportedEntry {
    Event(ImportedEvent),
    Delay(ImportedDelay),
    Block(ImportedBlock),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedEvent {
    #[serde(default)]
    id: Option<EntryId>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    presenter: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    colour: Option<String>,
    #[serde(default)]
    time_start: Option<i64>,
    #[serde(default)]
    time_end: Option<i64>,
    #[serde(default)]
    is_public: Option<bool>,
    #[serde(default)]
    skip: Option<bool>,
    #[serde(default)]
    revision: Option<u32>,
}

#[derive(Deserialize)]
struct ImportedDelay {
    #[serde(default)]
    id: Option<EntryId>,
    #[serde(default)]
    duration: Option<i64>,
}

#[derive(Deserialize)]
struct ImportedBlock {
    #[serde(default)]
    id: Option<EntryId>,
}

impl From<ImportedEntry> for EntryDraft {
    fn from(value: ImportedEntry) -> Self {
        match value {
            ImportedEntry::Event(event) => Self::Event(EventDraft {
                id: event.id,
                title: event.title,
                subtitle: event.subtitle,
                presenter: event.presenter,
                note: event.note,
                colour: event.colour,
                time_start: event.time_start,
                time_end: event.time_end,
                is_public: event.is_public,
                skip: event.skip,
                revision: event.revision,
            }),
            ImportedEntry::Delay(delay) => Self::Delay(DelayDraft {
                id: delay.id,
                duration: delay.duration,
            }),
            ImportedEntry::Block(block) => Self::Block(BlockDraft { id: block.id }),
        }
    }
}

/// Parses raw JSON text. See [`parse_rundown`].
pub fn parse_rundown_str(raw: &str, max_events: usize) -> Result<Vec<Entry>, ImportError> {
    let value: Value = serde_json::from_str(raw).map_err(ImportError::Json)?;
    parse_rundown(&value, max_events)
}

/// Converts imported data into a valid entry sequence.
///
/// - Stops once `max_events` entries were accepted.
/// - Skips an entry whose id was already accepted.
/// - Skips entries with an unknown `type` or mistyped known fields.
/// - Drops keys the model does not know.
/// - Generates missing ids and applies per-kind defaults.
pub fn parse_rundown(value: &Value, max_events: usize) -> Result<Vec<Entry>, ImportError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("rundown")
            .and_then(Value::as_array)
            .ok_or(ImportError::MissingRundown)?,
        _ => return Err(ImportError::MissingRundown),
    };

    let mut entries = Vec::with_capacity(items.len().min(max_events));
    let mut seen = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        if entries.len() >= max_events {
            warn!(
                "event=rundown_import module=service status=truncated max_events={max_events} dropped={}",
                items.len() - index
            );
            break;
        }

        let draft = match ImportedEntry::deserialize(item) {
            Ok(imported) => EntryDraft::from(imported),
            Err(err) => {
                warn!("event=rundown_import module=service status=skip index={index} reason=invalid_entry error={err}");
                continue;
            }
        };

        let entry = Entry::from_draft(draft);
        if let Err(err) = entry.validate() {
            warn!("event=rundown_import module=service status=skip index={index} reason=invalid_id error={err}");
            continue;
        }
        if !seen.insert(entry.id().to_string()) {
            warn!("event=rundown_import module=service status=skip index={index} reason=id_collision");
            continue;
        }
        entries.push(entry);
    }

    info!(
        "event=rundown_import module=service status=parsed entries={}",
        entries.len()
    );
    Ok(entries)
}
