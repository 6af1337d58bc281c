//! Store handle over the on-disk key-value database.
//!
//! A store is a data directory containing a single SQLite database file
//! with one table, `kv(key BLOB PRIMARY KEY, value BLOB)`. BLOB keys
//! compare with memcmp, so iteration order is byte order and prefix scans
//! are plain range queries.
//!
//! Read-write opens take the exclusive file lock up front (`locking_mode=
//! EXCLUSIVE` plus an immediate `BEGIN EXCLUSIVE`), so a store held by
//! another process fails here, at open time, rather than on a later
//! command. That failure is what [`crate::core::lock`] classifies.

use crate::core::error::ShellError;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database file name inside the store's data directory.
pub const STORE_DB_NAME: &str = "store.db";

/// How long a contended open waits before reporting the lock conflict.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

const KV_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS kv (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadWrite,
    ReadOnly,
}

/// Live connection to one store. Point reads and writes plus streaming
/// key iteration; closed exactly once via [`StoreHandle::close`].
#[derive(Debug)]
pub struct StoreHandle {
    conn: Connection,
}

pub fn store_db_path(root: &Path) -> PathBuf {
    root.join(STORE_DB_NAME)
}

impl StoreHandle {
    /// Open the store under `root`.
    ///
    /// Read-write creates the directory and database when missing and
    /// acquires the exclusive lock immediately. Read-only requires an
    /// existing store and probes it with a read, so a concurrent exclusive
    /// holder surfaces here as well.
    pub fn open(root: &Path, mode: OpenMode) -> Result<Self, ShellError> {
        let db_path = store_db_path(root);
        let conn = match mode {
            OpenMode::ReadWrite => {
                fs::create_dir_all(root).map_err(ShellError::IoError)?;
                let conn = Connection::open(&db_path)?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                conn.query_row("PRAGMA locking_mode=EXCLUSIVE;", [], |_| Ok(()))?;
                // Takes the exclusive file lock now; it is held until the
                // connection closes.
                conn.execute_batch("BEGIN EXCLUSIVE; COMMIT;")?;
                conn.execute(KV_SCHEMA, [])?;
                conn
            }
            OpenMode::ReadOnly => {
                if !db_path.is_file() {
                    return Err(ShellError::OpenError(format!(
                        "no store at {}",
                        root.display()
                    )));
                }
                let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                let tables: i64 = conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv'",
                    [],
                    |row| row.get(0),
                )?;
                if tables == 0 {
                    return Err(ShellError::OpenError(format!(
                        "{} is not a kvshell store",
                        root.display()
                    )));
                }
                conn
            }
        };
        Ok(StoreHandle { conn })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ShellError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn has(&self, key: &[u8]) -> Result<bool, ShellError> {
        let hit = self
            .conn
            .query_row("SELECT 1 FROM kv WHERE key = ?1", params![key], |_| Ok(()))
            .optional()?;
        Ok(hit.is_some())
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ShellError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Deleting an absent key is a no-op, matching the engine's own
    /// idempotent delete.
    pub fn delete(&self, key: &[u8]) -> Result<(), ShellError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Visit every key starting with `prefix` (all keys when `None`) in
    /// byte order. Each call starts a fresh scan.
    pub fn for_each_key<F>(&self, prefix: Option<&[u8]>, mut visit: F) -> Result<(), ShellError>
    where
        F: FnMut(&[u8]) -> Result<(), ShellError>,
    {
        let (sql, bounds): (&str, Vec<Vec<u8>>) = match prefix {
            Some(p) if !p.is_empty() => match prefix_upper_bound(p) {
                Some(upper) => (
                    "SELECT key FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key",
                    vec![p.to_vec(), upper],
                ),
                // All-0xff prefixes have no finite upper bound.
                None => (
                    "SELECT key FROM kv WHERE key >= ?1 ORDER BY key",
                    vec![p.to_vec()],
                ),
            },
            _ => ("SELECT key FROM kv ORDER BY key", vec![]),
        };

        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(bounds.iter()))?;
        while let Some(row) = rows.next()? {
            let key: Vec<u8> = row.get(0)?;
            visit(&key)?;
        }
        Ok(())
    }

    /// Close the connection. Nothing is in flight by the time shutdown
    /// calls this, so a close failure carries no recoverable information.
    pub fn close(self) {
        let _ = self.conn.close();
    }
}

/// Smallest key strictly greater than every key carrying `prefix`:
/// increment the last non-0xff byte and drop everything after it. An
/// all-0xff prefix has no such bound.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < 0xff {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}
