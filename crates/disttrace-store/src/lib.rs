//! Embedded SQLite persistence for agents, targets, users, traceroutes, and
//! hops. A thin, timed, logged wrapper over `rusqlite` — every call mirrors
//! spec component A's "open; query-row; query-rows; execute;
//! begin-transaction {prepare, execute, commit, rollback}; close" surface.
//!
//! Grounded on `other_examples/macwilam-linksense`'s `ServerDatabase`: lazy
//! owned `Connection`, `PRAGMA journal_mode=WAL`, domain-specific
//! table-creation functions invoked from a single `initialize`/bootstrap
//! entry point.

#![forbid(unsafe_code)]

pub mod error;
pub mod schema;

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use rusqlite::{Connection, Params};
use tracing::{debug, warn};

pub use error::StoreError;

/// Schema-versioned embedded relational store. `Connection` is guarded by a
/// plain [`Mutex`] rather than spread across a connection pool: SQLite
/// serializes writers internally and every call here is a fast local-disk
/// operation, so a single shared connection kept simple is the right choice
/// (matches the teacher reference's single lazily-opened `Connection`).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if needed) the database file at `path`, enables WAL
    /// journaling and foreign-key enforcement, and runs schema bootstrap.
    /// A failure here is fatal to the process per spec §4.A.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            source: e,
        })?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        schema::bootstrap(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database, bootstrapped the same way — used by unit
    /// and integration tests that don't want a temp file on disk.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        schema::bootstrap(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs a single-row query, returning `None` on "no rows" rather than an
    /// error (matches the original's `sql.ErrNoRows` → zero-value convention).
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: impl Params,
        f: impl FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, StoreError> {
        let start = Instant::now();
        let guard = self.conn.lock().expect("store mutex poisoned");
        match guard.query_row(sql, params, f) {
            Ok(value) => {
                debug!(elapsed = ?start.elapsed(), sql, "query_row ok");
                Ok(Some(value))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                debug!(elapsed = ?start.elapsed(), sql, "query_row: no rows");
                Ok(None)
            }
            Err(e) => {
                warn!(elapsed = ?start.elapsed(), sql, error = %e, "query_row failed");
                Err(e.into())
            }
        }
    }

    /// Runs a multi-row query, collecting every row through `f`.
    pub fn query_rows<T>(
        &self,
        sql: &str,
        params: impl Params,
        mut f: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StoreError> {
        let start = Instant::now();
        let guard = self.conn.lock().expect("store mutex poisoned");
        let run = (|| -> rusqlite::Result<Vec<T>> {
            let mut stmt = guard.prepare(sql)?;
            let rows = stmt.query_map(params, &mut f)?;
            rows.collect()
        })();
        match run {
            Ok(rows) => {
                debug!(elapsed = ?start.elapsed(), sql, rows = rows.len(), "query_rows ok");
                Ok(rows)
            }
            Err(e) => {
                warn!(elapsed = ?start.elapsed(), sql, error = %e, "query_rows failed");
                Err(e.into())
            }
        }
    }

    /// Runs a single mutating statement, returning the affected-row count.
    pub fn execute(&self, sql: &str, params: impl Params) -> Result<usize, StoreError> {
        let start = Instant::now();
        let guard = self.conn.lock().expect("store mutex poisoned");
        match guard.execute(sql, params) {
            Ok(n) => {
                debug!(elapsed = ?start.elapsed(), sql, rows = n, "execute ok");
                Ok(n)
            }
            Err(e) => {
                warn!(elapsed = ?start.elapsed(), sql, error = %e, "execute failed");
                Err(e.into())
            }
        }
    }

    /// Runs `f` inside a transaction: commits on `Ok`, rolls back and
    /// surfaces the error on `Err`. This collapses the original's
    /// begin/prepare/execute/commit-or-deferred-rollback sequence into a
    /// single closure — a dropped, uncommitted `rusqlite::Transaction`
    /// already rolls back on its own, so the `Err` arm here only needs to
    /// log before propagating.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let start = Instant::now();
        let mut guard = self.conn.lock().expect("store mutex poisoned");
        let tx = guard.transaction()?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                debug!(elapsed = ?start.elapsed(), "transaction committed");
                Ok(value)
            }
            Err(e) => {
                warn!(elapsed = ?start.elapsed(), error = %e, "transaction failed, rolling back");
                // tx drops here uncommitted; rusqlite rolls it back.
                Err(e)
            }
        }
    }

    /// Closes the underlying connection. Consuming `self` is the only
    /// "close" a `Mutex`-guarded connection needs — drop handles the rest.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_bootstraps_schema() {
        let store = Store::open_in_memory().unwrap();
        let count = store
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
            .unwrap();
        assert_eq!(count, Some(1));
    }

    #[test]
    fn open_on_disk_bootstraps_and_is_idempotent_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disttrace.db");

        let store = Store::open(&path).unwrap();
        let count = store
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
            .unwrap();
        assert_eq!(count, Some(1));
        store.close();

        // Reopening an already-migrated file must not re-seed the admin row.
        let reopened = Store::open(&path).unwrap();
        let count = reopened
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
            .unwrap();
        assert_eq!(count, Some(1));
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();
        let result: Result<(), StoreError> = store.transaction(|tx| {
            tx.execute(
                "INSERT INTO agents (id, name, secret) VALUES ('a1', 'falbala', '1234')",
                [],
            )?;
            Err(StoreError::Sqlite(rusqlite::Error::ExecuteReturnedResults))
        });
        assert!(result.is_err());

        let count = store
            .query_row("SELECT COUNT(*) FROM agents", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap();
        assert_eq!(count, Some(0));
    }

    #[test]
    fn transaction_commits_on_success() {
        let store = Store::open_in_memory().unwrap();
        store
            .transaction::<(), _>(|tx| {
                tx.execute(
                    "INSERT INTO agents (id, name, secret) VALUES ('a1', 'falbala', '1234')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let count = store
            .query_row("SELECT COUNT(*) FROM agents", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap();
        assert_eq!(count, Some(1));
    }
}
