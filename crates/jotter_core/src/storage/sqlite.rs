//! SQLite-backed storage.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections and migrate the schema.
//! - Store key-value items in the `kv_items` table.
//!
//! # Invariants
//! - Returned storages have migrations fully applied.
//! - `update_item` runs inside an IMMEDIATE transaction, so concurrent
//!   writers on the same database file are serialized by SQLite itself.

use super::migrations::apply_migrations;
use super::{KvStorage, StorageError, StorageResult};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value storage over one SQLite connection.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens a SQLite database file and applies all pending migrations.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        open_logged("file", || Connection::open(path))
    }

    /// Opens a private in-memory database; contents vanish on drop.
    pub fn open_in_memory() -> StorageResult<Self> {
        open_logged("memory", Connection::open_in_memory)
    }

    /// Current schema version recorded in `PRAGMA user_version`.
    pub fn schema_version(&self) -> StorageResult<u32> {
        let conn = self.lock()?;
        let version = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        Ok(version)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Poisoned("sqlite connection"))
    }
}

impl KvStorage for SqliteStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        read_value(&conn, key)
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        write_value(&conn, key, value)
    }

    fn update_item<T, E, F>(&self, key: &str, apply: F) -> Result<T, E>
    where
        F: FnOnce(Option<String>) -> Result<(Option<String>, T), E>,
        E: From<StorageError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let current = read_value(&tx, key)?;
        // Dropping `tx` on the error path rolls the transaction back.
        let (next, output) = apply(current)?;
        if let Some(value) = next {
            write_value(&tx, key, &value)?;
        }
        tx.commit().map_err(StorageError::from)?;
        Ok(output)
    }
}

fn read_value(conn: &Connection, key: &str) -> StorageResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv_items WHERE key = ?1;",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn write_value(conn: &Connection, key: &str, value: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO kv_items (key, value, updated_at)
         VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at;",
        params![key, value],
    )?;
    Ok(())
}

fn open_logged(
    mode: &'static str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> StorageResult<SqliteStorage> {
    let started_at = Instant::now();
    info!("event=db_open module=storage status=start mode={mode}");

    let mut conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=storage status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=storage status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(SqliteStorage {
                conn: Mutex::new(conn),
            })
        }
        Err(err) => {
            error!(
                "event=db_open module=storage status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> StorageResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}
