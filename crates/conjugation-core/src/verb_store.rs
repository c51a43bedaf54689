use std::{path::Path, sync::Mutex};

use log::{debug, info};
use rusqlite::{params, Connection, OpenFlags, Row};
use thiserror::Error;

const SELECT_VERBS: &str = "SELECT infinitive, mood, tense, verb_english, \
     form_1s, form_2s, form_3s, form_1p, form_2p, form_3p \
     FROM verbs WHERE infinitive = ?1 AND mood = ?2 AND tense = ?3 LIMIT ?4";

/// One row of conjugations: a verb in a single mood and tense.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerbRecord {
    pub infinitive: String,
    pub mood: String,
    pub tense: String,
    pub english_gloss: Option<String>,
    pub forms: PersonForms,
}

/// The conjugated forms of a verb for each grammatical person and number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersonForms {
    pub first_singular: Option<String>,
    pub second_singular: Option<String>,
    pub third_singular: Option<String>,
    pub first_plural: Option<String>,
    pub second_plural: Option<String>,
    pub third_plural: Option<String>,
}

/// The columns a row of conjugations is looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerbKey<'a> {
    pub infinitive: &'a str,
    pub mood: &'a str,
    pub tense: &'a str,
}

/// An error accessing the verb store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was already closed, or never opened.
    #[error("verb store not initialized")]
    NotInitialized,
    /// The lock around the connection was poisoned by a panicking query.
    #[error("verb store connection lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// Anything else the driver reports.
    #[error("{0}")]
    Other(String),
}

/// Something conjugation rows can be read from.
pub trait VerbStore: Send + Sync {
    /// Finds at most `limit` rows matching the provided key.
    fn find_verbs(&self, key: &VerbKey, limit: usize) -> Result<Vec<VerbRecord>, StoreError>;
}

/// A verb store backed by a SQLite database with a `verbs` table.
pub struct SqliteVerbStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteVerbStore {
    /// Opens the database at the provided path for reading. The database must already exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SqliteVerbStore, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!("Opened verb store at {}", path.display());

        Ok(SqliteVerbStore::from_connection(conn))
    }

    /// Wraps an already open connection.
    pub fn from_connection(conn: Connection) -> SqliteVerbStore {
        SqliteVerbStore {
            conn: Mutex::new(Some(conn)),
        }
    }

    /// Closes the underlying connection. Fails if it's already closed.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.take().ok_or(StoreError::NotInitialized)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        info!("Closed verb store");

        Ok(())
    }
}

impl VerbStore for SqliteVerbStore {
    fn find_verbs(&self, key: &VerbKey, limit: usize) -> Result<Vec<VerbRecord>, StoreError> {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        debug!("Querying verbs for {key:?}");
        let limit = i64::try_from(limit).map_err(|e| StoreError::Other(e.to_string()))?;
        let mut stmt = conn.prepare_cached(SELECT_VERBS)?;
        let records = stmt
            .query_map(
                params![key.infinitive, key.mood, key.tense, limit],
                record_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

fn record_from_row(row: &Row) -> rusqlite::Result<VerbRecord> {
    Ok(VerbRecord {
        infinitive: row.get(0)?,
        mood: row.get(1)?,
        tense: row.get(2)?,
        english_gloss: row.get(3)?,
        forms: PersonForms {
            first_singular: row.get(4)?,
            second_singular: row.get(5)?,
            third_singular: row.get(6)?,
            first_plural: row.get(7)?,
            second_plural: row.get(8)?,
            third_plural: row.get(9)?,
        },
    })
}
