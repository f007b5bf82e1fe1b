//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Every migration script is idempotent (`IF NOT EXISTS`), so re-running a
//!   step after an interrupted upgrade is safe.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "books",
    sql: include_str!("0001_books.sql"),
}];

/// Outcome of one `apply_migrations` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub applied: u32,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied == 0
    }
}

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// All pending steps run inside one transaction; a failing step leaves the
/// database at its previous version. Every SQLite failure in here, including
/// reading the version and committing, is a `DbError::Migration` tagged with
/// the target version.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let latest = latest_version();
    let upgrade_failed = move |source: rusqlite::Error| DbError::Migration {
        version: latest,
        source,
    };
    let current_version = read_user_version(conn).map_err(upgrade_failed)?;

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    let mut report = MigrationReport {
        from_version: current_version,
        to_version: current_version,
        applied: 0,
    };
    if current_version == latest {
        return Ok(report);
    }

    let tx = conn.transaction().map_err(upgrade_failed)?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::Migration {
                version: migration.version,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
        report.to_version = migration.version;
        report.applied += 1;
    }
    tx.commit().map_err(upgrade_failed)?;

    Ok(report)
}

/// Reads the schema version stored in the database header.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(read_user_version(conn)?)
}

fn read_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
}
