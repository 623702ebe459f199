//! Schema bootstrap: versioned migrations applied inside a single transaction
//! per step, mirroring `db-schema.go`'s `createAndUpdateDbSchema`. Table and
//! column names are rewritten to idiomatic `snake_case` — the wire contract
//! lives in `disttrace-proto`, not in SQL identifiers, so this renaming is
//! free.

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::error::StoreError;

/// Highest schema version this build knows how to reach.
pub const CURRENT_VERSION: i64 = 2;

/// `t_schema_info` in original naming.
pub const TABLE_SCHEMA_INFO: &str = "schema_info";
pub const TABLE_AGENTS: &str = "agents";
pub const TABLE_TARGETS: &str = "targets";
pub const TABLE_USERS: &str = "users";
pub const TABLE_TRACEROUTES: &str = "traceroutes";
pub const TABLE_HOPS: &str = "hops";

/// The default operator seeded at schema version 2, matching the original's
/// hard-coded `admin`/`123` row (`db-schema.go`). The password hash is
/// computed at migration time via [`disttrace_proto::hash_password`] rather
/// than carried as a literal hex blob, so it stays correct if the hashing
/// scheme is ever inspected in tests.
const SEED_ADMIN_ID: &str = "998dd43d-86b1-44a3-8f28-d31cd2822927";
const SEED_ADMIN_NAME: &str = "admin";
const SEED_ADMIN_PASSWORD: &str = "123";
const SEED_ADMIN_SALT: i64 = 1_298_498_081;

/// Reads `schema_info.version`, treating a missing table as version 0.
pub fn current_version(conn: &Connection) -> Result<i64, StoreError> {
    let table_exists: Option<String> = conn
        .query_row(
            "SELECT tbl_name FROM sqlite_master WHERE type = 'table' AND tbl_name = ?1",
            params![TABLE_SCHEMA_INFO],
            |row| row.get(0),
        )
        .ok();

    if table_exists.is_none() {
        debug!("schema_info table absent, treating database as version 0");
        return Ok(0);
    }

    let version: i64 = conn.query_row(
        &format!("SELECT version FROM {TABLE_SCHEMA_INFO}"),
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Applies every versioned migration between the database's current version
/// and [`CURRENT_VERSION`], each inside its own transaction. Idempotent:
/// calling this on an already-migrated database is a no-op.
pub fn bootstrap(conn: &mut Connection) -> Result<(), StoreError> {
    let mut version = current_version(conn)?;
    if version >= CURRENT_VERSION {
        info!(version, "schema is current, no migration needed");
        return Ok(());
    }

    warn!(
        from = version,
        to = CURRENT_VERSION,
        "database schema needs upgrading"
    );

    while version < CURRENT_VERSION {
        let next = version + 1;
        let tx = conn.transaction().map_err(|e| StoreError::Migration {
            version: next,
            source: e,
        })?;

        apply_migration(&tx, next).map_err(|e| StoreError::Migration {
            version: next,
            source: e,
        })?;

        tx.commit().map_err(|e| StoreError::Migration {
            version: next,
            source: e,
        })?;
        info!(version = next, "upgraded database schema");
        version = next;
    }

    Ok(())
}

fn apply_migration(tx: &rusqlite::Transaction<'_>, target: i64) -> rusqlite::Result<()> {
    match target {
        1 => {
            tx.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {TABLE_SCHEMA_INFO} (version INTEGER PRIMARY KEY)"
                ),
                [],
            )?;
            tx.execute(
                &format!("INSERT INTO {TABLE_SCHEMA_INFO} (version) VALUES (1)"),
                [],
            )?;
            Ok(())
        }
        2 => {
            tx.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {TABLE_AGENTS} (
                        id TEXT PRIMARY KEY,
                        name TEXT NOT NULL UNIQUE,
                        secret TEXT NOT NULL
                    )"
                ),
                [],
            )?;
            tx.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {TABLE_TARGETS} (
                        id TEXT PRIMARY KEY,
                        name TEXT NOT NULL UNIQUE,
                        address TEXT NOT NULL,
                        retries INTEGER NOT NULL,
                        max_hops INTEGER NOT NULL,
                        timeout_ms INTEGER NOT NULL
                    )"
                ),
                [],
            )?;
            tx.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {TABLE_USERS} (
                        id TEXT PRIMARY KEY,
                        name TEXT NOT NULL UNIQUE,
                        password_hash TEXT NOT NULL,
                        salt INTEGER NOT NULL,
                        password_needs_change INTEGER NOT NULL
                    )"
                ),
                [],
            )?;
            tx.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {TABLE_TRACEROUTES} (
                        id TEXT PRIMARY KEY,
                        agent_id TEXT NOT NULL,
                        target_id TEXT NOT NULL,
                        start_time TEXT NOT NULL,
                        annotations TEXT NOT NULL DEFAULT ''
                    )"
                ),
                [],
            )?;
            tx.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {TABLE_HOPS} (
                        id TEXT PRIMARY KEY,
                        traceroute_id TEXT NOT NULL,
                        hop_index INTEGER NOT NULL,
                        ip_address TEXT NOT NULL,
                        dns_name TEXT,
                        duration_secs REAL NOT NULL,
                        previous_hop_id TEXT
                    )"
                ),
                [],
            )?;
            tx.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_hops_traceroute ON {TABLE_HOPS}(traceroute_id)"
                ),
                [],
            )?;
            tx.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_traceroutes_start ON {TABLE_TRACEROUTES}(start_time)"
                ),
                [],
            )?;

            let password_hash = disttrace_proto::hash_password(SEED_ADMIN_PASSWORD, SEED_ADMIN_SALT);
            tx.execute(
                &format!(
                    "INSERT INTO {TABLE_USERS} (id, name, password_hash, salt, password_needs_change)
                     VALUES (?1, ?2, ?3, ?4, 1)"
                ),
                params![SEED_ADMIN_ID, SEED_ADMIN_NAME, password_hash, SEED_ADMIN_SALT],
            )?;

            tx.execute(
                &format!("UPDATE {TABLE_SCHEMA_INFO} SET version = 2"),
                [],
            )?;
            Ok(())
        }
        other => panic!("no migration defined for schema version {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();
        let version_after_first = current_version(&conn).unwrap();
        bootstrap(&mut conn).unwrap();
        let version_after_second = current_version(&conn).unwrap();
        assert_eq!(version_after_first, CURRENT_VERSION);
        assert_eq!(version_after_second, CURRENT_VERSION);
    }

    #[test]
    fn bootstrap_seeds_admin_user() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();
        let name: String = conn
            .query_row(
                &format!("SELECT name FROM {TABLE_USERS} WHERE id = ?1"),
                params![SEED_ADMIN_ID],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "admin");
    }
}
