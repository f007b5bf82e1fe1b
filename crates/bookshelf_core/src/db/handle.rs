//! Shared handle to the opened book database.

use super::migrations::MigrationReport;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Arc;

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

impl TxMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "readonly",
            Self::ReadWrite => "readwrite",
        }
    }

    fn behavior(self) -> TransactionBehavior {
        match self {
            Self::ReadOnly => TransactionBehavior::Deferred,
            // Write lock taken at BEGIN.
            Self::ReadWrite => TransactionBehavior::Immediate,
        }
    }
}

/// Cheaply cloneable reference to the memoized connection.
///
/// Callers may only run transactions through it; the connection itself is
/// never handed out.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    conn: Mutex<Connection>,
    attempt: u64,
    migration: MigrationReport,
}

impl StoreHandle {
    pub(crate) fn new(conn: Connection, attempt: u64, migration: MigrationReport) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                conn: Mutex::new(conn),
                attempt,
                migration,
            }),
        }
    }

    /// Open attempt that produced this handle (1-based).
    pub fn attempt(&self) -> u64 {
        self.inner.attempt
    }

    /// Migrations applied while opening this handle.
    pub fn migration(&self) -> MigrationReport {
        self.inner.migration
    }

    /// Returns whether both handles share the same underlying connection.
    pub fn same_connection(&self, other: &StoreHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs `body` inside one transaction.
    ///
    /// Commits when `body` succeeds; any error rolls the whole transaction
    /// back. Blocks the calling thread while waiting for the connection.
    pub fn transaction<T, E>(
        &self,
        mode: TxMode,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let mut conn = self.inner.conn.lock();
        let tx = conn.transaction_with_behavior(mode.behavior())?;
        let value = body(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
