//! SQLite storage bootstrap, schema migration and connection lifecycle.
//!
//! # Responsibility
//! - Describe where the book database lives (`StorageEngine`).
//! - Open and configure SQLite connections and apply schema migrations.
//! - Own the single process-wide connection handle (`ConnectionManager`).
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No book data is read or written before migrations succeed.
//! - Only `ConnectionManager` creates `StoreHandle`s for the service layer.

use crate::error::{StorageStage, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod engine;
mod handle;
mod manager;
pub mod migrations;
mod open;

pub use engine::{FileEngine, MemoryEngine, StorageEngine};
pub use handle::{StoreHandle, TxMode};
pub use manager::{ConnectionManager, ConnectionStatus};
pub use migrations::MigrationReport;
pub use open::{open_db, open_db_in_memory, open_engine};

/// Logical database name; file engines derive their default file name from it.
pub const DB_NAME: &str = "baby-bookshelf";

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Pipeline stage this failure belongs to.
    pub fn stage(&self) -> StorageStage {
        match self {
            Self::Sqlite(_) => StorageStage::Open,
            Self::Migration { .. } | Self::UnsupportedSchemaVersion { .. } => {
                StorageStage::Migration
            }
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Migration { version, source } => {
                write!(f, "migration to version {version} failed: {source}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        let stage = value.stage();
        let message = match stage {
            StorageStage::Migration => "failed to upgrade book database schema",
            _ => "failed to open book database",
        };
        StoreError::storage(stage, message, value)
    }
}
