//! Timeline persistence contract and SQLite implementation.
//!
//! # Responsibility
//! - Load and save the full timeline state (live blocks, tombstones).
//! - Persist the undo history so it survives a process restart.
//!
//! # Invariants
//! - `save` replaces the stored state in one transaction.
//! - Malformed stored state never surfaces as an error from `load`; it is
//!   reported as `LoadStatus::Recovered` with an empty timeline.
//! - Row order (`position`) is the timeline order.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::block::{ActivityKind, Block, DeleteStatus};
use crate::store::{TimelineState, UndoSnapshot};
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for timeline persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection schema is not at the version this build expects.
    SchemaNotReady { found: u32, expected: u32 },
    InvalidData(String),
    Serialization(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SchemaNotReady { found, expected } => write!(
                f,
                "timeline schema version {found} does not match expected {expected}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted timeline data: {message}"),
            Self::Serialization(err) => write!(f, "timeline serialization failed: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::SchemaNotReady { .. } | Self::InvalidData(_) => None,
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

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// How a `load` call obtained its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing stored yet.
    Fresh,
    Loaded,
    /// Stored data was malformed and has been replaced by an empty timeline.
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTimeline {
    pub state: TimelineState,
    pub status: LoadStatus,
}

/// Persistence gateway for the timeline.
pub trait TimelineRepository {
    fn load(&self) -> RepoResult<LoadedTimeline>;
    fn save(&self, state: &TimelineState) -> RepoResult<()>;
    /// Undo entries oldest first. Unreadable entries are dropped.
    fn load_undo(&self) -> RepoResult<Vec<UndoSnapshot>>;
    fn save_undo(&self, entries: &[UndoSnapshot]) -> RepoResult<()>;
}

/// SQLite-backed timeline repository.
pub struct SqliteTimelineRepository<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteTimelineRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let found = current_user_version(conn)?;
        let expected = latest_version();
        if found != expected {
            return Err(RepoError::SchemaNotReady { found, expected });
        }
        Ok(Self { conn })
    }
}

impl TimelineRepository for SqliteTimelineRepository<'_> {
    fn load(&self) -> RepoResult<LoadedTimeline> {
        let blocks = read_blocks(self.conn, "blocks", false)?;
        let tombstones = read_blocks(self.conn, "tombstones", true)?;

        let (blocks, tombstones) = match (blocks, tombstones) {
            (Ok(blocks), Ok(tombstones)) => (blocks, tombstones),
            (Err(err), _) | (_, Err(err)) => {
                warn!("event=timeline_load module=repo status=recovered reason={err}");
                return Ok(LoadedTimeline {
                    state: TimelineState::default(),
                    status: LoadStatus::Recovered,
                });
            }
        };

        let state = TimelineState::from_parts(blocks, tombstones);
        if let Err(violation) = state.check_invariants() {
            warn!("event=timeline_load module=repo status=recovered reason={violation}");
            return Ok(LoadedTimeline {
                state: TimelineState::default(),
                status: LoadStatus::Recovered,
            });
        }

        let status = if state.is_empty() {
            LoadStatus::Fresh
        } else {
            LoadStatus::Loaded
        };
        Ok(LoadedTimeline { state, status })
    }

    fn save(&self, state: &TimelineState) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM blocks;", [])?;
        tx.execute("DELETE FROM tombstones;", [])?;

        for (position, block) in state.blocks.iter().enumerate() {
            tx.execute(
                "INSERT INTO blocks (position, id, kind, start_ms, end_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    position as i64,
                    block.id,
                    block.kind.as_label(),
                    block.start.timestamp_millis(),
                    block.end.map(|end| end.timestamp_millis()),
                ],
            )?;
        }

        for (position, block) in state.tombstones.iter().enumerate() {
            let status = block.delete_status.unwrap_or(DeleteStatus::Deleted);
            tx.execute(
                "INSERT INTO tombstones (position, id, kind, start_ms, end_ms, delete_status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    position as i64,
                    block.id,
                    block.kind.as_label(),
                    block.start.timestamp_millis(),
                    block.end.map(|end| end.timestamp_millis()),
                    status.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_undo(&self) -> RepoResult<Vec<UndoSnapshot>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM undo_slots ORDER BY position ASC;")?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            match serde_json::from_str::<UndoSnapshot>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    warn!("event=undo_load module=repo status=skipped reason={err}");
                }
            }
        }
        Ok(entries)
    }

    fn save_undo(&self, entries: &[UndoSnapshot]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM undo_slots;", [])?;
        for (position, entry) in entries.iter().enumerate() {
            tx.execute(
                "INSERT INTO undo_slots (position, captured_at_ms, payload) VALUES (?1, ?2, ?3);",
                params![
                    position as i64,
                    entry.captured_at.timestamp_millis(),
                    serde_json::to_string(entry)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Outer error: SQLite failure. Inner error: a row that cannot be parsed.
fn read_blocks(
    conn: &Connection,
    table: &str,
    tombstones: bool,
) -> RepoResult<Result<Vec<Block>, RepoError>> {
    let status_column = if tombstones { "delete_status" } else { "NULL" };
    let mut stmt = conn.prepare(&format!(
        "SELECT id, kind, start_ms, end_ms, {status_column} AS delete_status
         FROM {table}
         ORDER BY position ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    let mut blocks = Vec::new();
    while let Some(row) = rows.next()? {
        match parse_block_row(row, table) {
            Ok(block) => blocks.push(block),
            Err(err) => return Ok(Err(err)),
        }
    }
    Ok(Ok(blocks))
}

fn parse_block_row(row: &Row<'_>, table: &str) -> RepoResult<Block> {
    let id: i64 = row.get("id")?;
    let kind: String = row.get("kind")?;
    let start_ms: i64 = row.get("start_ms")?;
    let end_ms: Option<i64> = row.get("end_ms")?;
    let status: Option<String> = row.get("delete_status")?;

    if kind.trim().is_empty() {
        return Err(RepoError::InvalidData(format!("empty kind for {table}.id={id}")));
    }
    let start = millis_to_instant(start_ms, table, id)?;
    let end = end_ms
        .map(|value| millis_to_instant(value, table, id))
        .transpose()?;
    let delete_status = match status {
        Some(value) => Some(DeleteStatus::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid delete status `{value}` in {table}.id={id}"))
        })?),
        None => None,
    };

    Ok(Block {
        id,
        kind: ActivityKind::from_label(&kind),
        start,
        end,
        delete_status,
    })
}

fn millis_to_instant(value: i64, table: &str, id: i64) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("timestamp {value} out of range in {table}.id={id}"))
    })
}
