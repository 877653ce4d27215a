//! Client schema registry and executor.
//!
//! # Responsibility
//! - Register schema steps in strictly increasing order.
//! - Apply pending steps atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied version is mirrored to `PRAGMA user_version`.
//! - Every step is written with `IF NOT EXISTS`, so re-running is harmless.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_clients.sql"),
}];

/// Tables every client repository depends on.
pub const REQUIRED_TABLES: [&str; 2] = ["clients", "phones"];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Creates the `clients` and `phones` tables when absent.
///
/// Safe to call on every startup: a second call on an up-to-date database
/// executes no DDL and returns `Ok(())`.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the database was written by a
///   newer binary.
/// - `DbError::Schema` when the store rejects a definition. Nothing from the
///   failing call is left applied.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        error!(
            "event=schema_ensure module=db status=error error_code=unsupported_version db_version={} latest={}",
            current_version, latest
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    let tables_present = required_tables_present(conn)?;
    if current_version == latest && tables_present {
        return Ok(());
    }

    // A stamped version without its tables is replayed from scratch.
    let from_version = if tables_present { current_version } else { 0 };
    apply_pending(conn, from_version).map_err(|err| {
        error!(
            "event=schema_ensure module=db status=error error_code=schema_rejected from_version={} error={}",
            from_version, err
        );
        DbError::Schema(err)
    })?;

    info!(
        "event=schema_ensure module=db status=ok from_version={} to_version={}",
        from_version, latest
    );
    Ok(())
}

fn apply_pending(conn: &mut Connection, current_version: u32) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()
}

fn required_tables_present(conn: &Connection) -> DbResult<bool> {
    for table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Ok(false);
        }
    }
    Ok(true)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
