//! The [`Store`]: a SQLite connection behind a mutex, with one transaction
//! per logical operation.

mod admin;
mod telemetry;
mod tests_repo;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;
use crate::schema::SCHEMA;

/// Handle to the relational store. Cheap to share behind an `Arc`; safe to
/// call from any number of request-handling tasks.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        debug!("schema applied");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside a transaction, committing on success.
    pub(crate) fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run a read-only `f` against the connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock();
        f(&conn)
    }
}

/// Current wall-clock time in Unix milliseconds.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn ts_from_ms(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::corrupt(format!("timestamp out of range: {ms}")))
}

pub(crate) fn uuid_from(s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(|_| StorageError::corrupt(format!("bad uuid: {s}")))
}

pub(crate) fn opt_uuid_from(s: Option<&str>) -> Result<Option<Uuid>, StorageError> {
    s.map(uuid_from).transpose()
}

/// Assign dense 1..n order numbers, preserving the caller's relative order
/// (explicit `order_num` first, then input position as tie-breaker).
pub(crate) fn dense_order<T>(items: Vec<T>, given: impl Fn(&T) -> Option<i64>) -> Vec<(i64, T)> {
    let mut keyed: Vec<(i64, usize, T)> = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let key = given(&item).unwrap_or((idx + 1) as i64);
            (key, idx, item)
        })
        .collect();
    keyed.sort_by_key(|(key, idx, _)| (*key, *idx));
    keyed
        .into_iter()
        .enumerate()
        .map(|(pos, (_, _, item))| ((pos + 1) as i64, item))
        .collect()
}
