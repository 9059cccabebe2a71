//! Rundown repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the ordered entry sequence behind a storage-agnostic trait.
//! - Keep SQL and position bookkeeping inside the repository boundary.
//!
//! # Invariants
//! - `position` values are dense (`0..len`) after every committed write.
//! - Positional writes run in one immediate transaction.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::entry::{BlockEntry, DelayEntry, Entry, EntryId, EventEntry};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ENTRY_SELECT_SQL: &str = "SELECT
    entry_id,
    kind,
    title,
    subtitle,
    presenter,
    note,
    colour,
    time_start,
    time_end,
    is_public,
    skip,
    revision,
    duration
FROM rundown_entries";

const ENTRY_INSERT_SQL: &str = "INSERT INTO rundown_entries (
    entry_id,
    position,
    kind,
    title,
    subtitle,
    presenter,
    note,
    colour,
    time_start,
    time_end,
    is_public,
    skip,
    revision,
    duration
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from rundown persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Referenced entry does not exist in storage.
    NotFound(EntryId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid entry.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "persisted entry not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "rundown repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted rundown data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence provider for the rundown.
pub trait RundownRepository {
    /// Loads the whole sequence in order.
    fn get_rundown(&self) -> RepoResult<Vec<Entry>>;
    /// Replaces the whole sequence.
    fn set_rundown(&self, entries: &[Entry]) -> RepoResult<()>;
    /// Inserts one entry at `position` (clamped to the end).
    fn insert_entry_at(&self, entry: &Entry, position: usize) -> RepoResult<()>;
    /// Inserts one entry right after `after_id`.
    fn insert_entry_after_id(&self, entry: &Entry, after_id: &str) -> RepoResult<()>;
    /// Overwrites the stored fields of entry `id`.
    fn update_entry_by_id(&self, id: &str, entry: &Entry) -> RepoResult<()>;
    /// Removes entry `id` and closes the position gap.
    fn delete_entry(&self, id: &str) -> RepoResult<()>;
    /// Removes every entry.
    fn clear_rundown(&self) -> RepoResult<()>;
    /// Loads one entry.
    fn get_entry_by_id(&self, id: &str) -> RepoResult<Option<Entry>>;
    /// Number of stored entries.
    fn rundown_len(&self) -> RepoResult<usize>;
}

/// SQLite-backed rundown repository.
///
/// Owns its connection so the service can hold it behind a lock shared
/// across threads.
#[derive(Debug)]
pub struct SqliteRundownRepository {
    conn: Connection,
}

impl SqliteRundownRepository {
    /// Creates the repository from a migrated connection.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    /// Gives the connection back, e.g. to inspect it in tests.
    pub fn into_inner(self) -> Connection {
        self.conn
    }

    fn begin(&self) -> RepoResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl RundownRepository for SqliteRundownRepository {
    fn get_rundown(&self) -> RepoResult<Vec<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} ORDER BY position ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn set_rundown(&self, entries: &[Entry]) -> RepoResult<()> {
        let tx = self.begin()?;
        tx.execute("DELETE FROM rundown_entries;", [])?;
        for (position, entry) in entries.iter().enumerate() {
            insert_row(&tx, entry, position)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_entry_at(&self, entry: &Entry, position: usize) -> RepoResult<()> {
        let tx = self.begin()?;
        let position = position.min(count_rows(&tx)?);
        open_gap(&tx, position)?;
        insert_row(&tx, entry, position)?;
        tx.commit()?;
        Ok(())
    }

    fn insert_entry_after_id(&self, entry: &Entry, after_id: &str) -> RepoResult<()> {
        let tx = self.begin()?;
        let anchor =
            position_of(&tx, after_id)?.ok_or_else(|| RepoError::NotFound(after_id.to_string()))?;
        open_gap(&tx, anchor + 1)?;
        insert_row(&tx, entry, anchor + 1)?;
        tx.commit()?;
        Ok(())
    }

    fn update_entry_by_id(&self, id: &str, entry: &Entry) -> RepoResult<()> {
        let columns = EntryColumns::from(entry);
        let changed = self.conn.execute(
            "UPDATE rundown_entries
             SET
                kind = ?2,
                title = ?3,
                subtitle = ?4,
                presenter = ?5,
                note = ?6,
                colour = ?7,
                time_start = ?8,
                time_end = ?9,
                is_public = ?10,
                skip = ?11,
                revision = ?12,
                duration = ?13,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE entry_id = ?1;",
            params![
                id,
                columns.kind,
                columns.title,
                columns.subtitle,
                columns.presenter,
                columns.note,
                columns.colour,
                columns.time_start,
                columns.time_end,
                columns.is_public,
                columns.skip,
                columns.revision,
                columns.duration,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_entry(&self, id: &str) -> RepoResult<()> {
        let tx = self.begin()?;
        let position = position_of(&tx, id)?.ok_or_else(|| RepoError::NotFound(id.to_string()))?;
        tx.execute("DELETE FROM rundown_entries WHERE entry_id = ?1;", [id])?;
        tx.execute(
            "UPDATE rundown_entries SET position = position - 1 WHERE position > ?1;",
            [to_db_position(position)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn clear_rundown(&self) -> RepoResult<()> {
        self.conn.execute("DELETE FROM rundown_entries;", [])?;
        Ok(())
    }

    fn get_entry_by_id(&self, id: &str) -> RepoResult<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE entry_id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }
        Ok(None)
    }

    fn rundown_len(&self) -> RepoResult<usize> {
        count_rows(&self.conn)
    }
}

/// Flat column projection of one entry.
struct EntryColumns<'a> {
    kind: &'static str,
    title: &'a str,
    subtitle: &'a str,
    presenter: &'a str,
    note: &'a str,
    colour: &'a str,
    time_start: i64,
    time_end: i64,
    is_public: i64,
    skip: i64,
    revision: i64,
    duration: i64,
}

impl<'a> From<&'a Entry> for EntryColumns<'a> {
    fn from(entry: &'a Entry) -> Self {
        let mut columns = Self {
            kind: entry.kind().as_str(),
            title: "",
            subtitle: "",
            presenter: "",
            note: "",
            colour: "",
            time_start: 0,
            time_end: 0,
            is_public: 0,
            skip: 0,
            revision: 0,
            duration: 0,
        };
        match entry {
            Entry::Event(event) => {
                columns.title = event.title.as_str();
                columns.subtitle = event.subtitle.as_str();
                columns.presenter = event.presenter.as_str();
                columns.note = event.note.as_str();
                columns.colour = event.colour.as_str();
                columns.time_start = event.time_start;
                columns.time_end = event.time_end;
                columns.is_public = bool_to_int(event.is_public);
                columns.skip = bool_to_int(event.skip);
                columns.revision = i64::from(event.revision);
            }
            Entry::Delay(delay) => columns.duration = delay.duration,
            Entry::Block(_) => {}
        }
        columns
    }
}

fn insert_row(conn: &Connection, entry: &Entry, position: usize) -> RepoResult<()> {
    let columns = EntryColumns::from(entry);
    conn.execute(
        ENTRY_INSERT_SQL,
        params![
            entry.id(),
            to_db_position(position)?,
            columns.kind,
            columns.title,
            columns.subtitle,
            columns.presenter,
            columns.note,
            columns.colour,
            columns.time_start,
            columns.time_end,
            columns.is_public,
            columns.skip,
            columns.revision,
            columns.duration,
        ],
    )?;
    Ok(())
}

fn open_gap(conn: &Connection, position: usize) -> RepoResult<()> {
    conn.execute(
        "UPDATE rundown_entries SET position = position + 1 WHERE position >= ?1;",
        [to_db_position(position)?],
    )?;
    Ok(())
}

fn position_of(conn: &Connection, id: &str) -> RepoResult<Option<usize>> {
    let position: Option<i64> = conn
        .query_row(
            "SELECT position FROM rundown_entries WHERE entry_id = ?1;",
            [id],
            |row| row.get(0),
        )
        .optional()?;
    position.map(from_db_position).transpose()
}

fn count_rows(conn: &Connection) -> RepoResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM rundown_entries;", [], |row| {
        row.get(0)
    })?;
    from_db_position(count)
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<Entry> {
    let id: String = row.get("entry_id")?;
    let kind: String = row.get("kind")?;

    let entry = match kind.as_str() {
        "event" => {
            let revision_value: i64 = row.get("revision")?;
            let revision = u32::try_from(revision_value).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid revision `{revision_value}` in rundown_entries.revision"
                ))
            })?;
            Entry::Event(EventEntry {
                id,
                title: row.get("title")?,
                subtitle: row.get("subtitle")?,
                presenter: row.get("presenter")?,
                note: row.get("note")?,
                colour: row.get("colour")?,
                time_start: row.get("time_start")?,
                time_end: row.get("time_end")?,
                is_public: parse_flag(row.get("is_public")?, "is_public")?,
                skip: parse_flag(row.get("skip")?, "skip")?,
                revision,
            })
        }
        "delay" => Entry::Delay(DelayEntry {
            id,
            duration: row.get("duration")?,
        }),
        "block" => Entry::Block(BlockEntry { id }),
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid entry kind `{other}` in rundown_entries.kind"
            )))
        }
    };

    entry
        .validate()
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;
    Ok(entry)
}

fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in rundown_entries.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn to_db_position(position: usize) -> RepoResult<i64> {
    i64::try_from(position)
        .map_err(|_| RepoError::InvalidData(format!("position {position} out of range")))
}

fn from_db_position(value: i64) -> RepoResult<usize> {
    usize::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid position value `{value}`")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
