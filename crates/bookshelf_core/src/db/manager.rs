//! Lazily opened, memoized connection with coalesced open attempts.
//!
//! # Responsibility
//! - Open the book database on first use and keep the handle for the rest
//!   of the process lifetime.
//! - Make concurrent first callers share one in-flight open attempt.
//! - Forget failed attempts so the next caller retries from scratch.
//!
//! # Invariants
//! - At most one open attempt is in flight at any time.
//! - Only a waiter of the current attempt may move the state out of
//!   `Opening`.
//! - The state lock is never held across an `.await`.

use super::engine::StorageEngine;
use super::handle::StoreHandle;
use super::open::open_engine;
use crate::error::{StoreError, StoreResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type OpenAttempt = Shared<BoxFuture<'static, StoreResult<StoreHandle>>>;

/// Externally visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unopened,
    Opening,
    Open,
    Failed,
}

enum ConnectionState {
    Unopened,
    Opening { attempt: u64, pending: OpenAttempt },
    Open(StoreHandle),
    Failed(StoreError),
}

/// Owner of the single connection handle.
pub struct ConnectionManager {
    engine: Arc<dyn StorageEngine>,
    state: Mutex<ConnectionState>,
    attempts: AtomicU64,
}

impl ConnectionManager {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(ConnectionState::Unopened),
            attempts: AtomicU64::new(0),
        }
    }

    /// Returns the open handle, opening the database if needed.
    ///
    /// Safe to call concurrently: callers arriving while an open is in
    /// flight await that same attempt.
    ///
    /// # Errors
    /// - `StorageUnavailable` when the engine reports no usable storage.
    /// - `StorageError` when opening or migrating fails.
    ///
    /// Both leave the manager in `Failed`; the next call starts a new attempt.
    pub async fn acquire(&self) -> StoreResult<StoreHandle> {
        let (attempt, pending) = {
            let mut state = self.state.lock();
            let in_flight = match &*state {
                ConnectionState::Open(handle) => return Ok(handle.clone()),
                ConnectionState::Opening { attempt, pending } => Some((*attempt, pending.clone())),
                ConnectionState::Unopened | ConnectionState::Failed(_) => None,
            };
            match in_flight {
                Some((attempt, pending)) => {
                    debug!("event=db_acquire module=db status=coalesced attempt={attempt}");
                    (attempt, pending)
                }
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = self.start_attempt(attempt);
                    *state = ConnectionState::Opening {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let outcome = pending.await;
        self.settle(attempt, &outcome);
        outcome
    }

    pub fn status(&self) -> ConnectionStatus {
        match &*self.state.lock() {
            ConnectionState::Unopened => ConnectionStatus::Unopened,
            ConnectionState::Opening { .. } => ConnectionStatus::Opening,
            ConnectionState::Open(_) => ConnectionStatus::Open,
            ConnectionState::Failed(_) => ConnectionStatus::Failed,
        }
    }

    /// Error of the most recent attempt while in `Failed`.
    pub fn last_error(&self) -> Option<StoreError> {
        match &*self.state.lock() {
            ConnectionState::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }

    /// Number of open attempts started so far.
    pub fn open_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn start_attempt(&self, attempt: u64) -> OpenAttempt {
        let engine = Arc::clone(&self.engine);
        info!(
            "event=db_acquire module=db status=start attempt={attempt} mode={}",
            engine.mode()
        );

        async move {
            match tokio::task::spawn_blocking(move || open_blocking(engine.as_ref(), attempt)).await
            {
                Ok(outcome) => outcome,
                Err(err) => Err(StoreError::unknown("failed to open book database", err)),
            }
        }
        .boxed()
        .shared()
    }

    fn settle(&self, attempt: u64, outcome: &StoreResult<StoreHandle>) {
        let mut state = self.state.lock();
        let current = match &*state {
            ConnectionState::Opening { attempt: current, .. } => *current,
            _ => return,
        };
        if current != attempt {
            return;
        }

        *state = match outcome {
            Ok(handle) => {
                info!(
                    "event=db_acquire module=db status=ok attempt={attempt} migrations_applied={}",
                    handle.migration().applied
                );
                ConnectionState::Open(handle.clone())
            }
            Err(error) => {
                warn!(
                    "event=db_acquire module=db status=error attempt={attempt} error_code={} error={}",
                    error.code(),
                    error
                );
                ConnectionState::Failed(error.clone())
            }
        };
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("mode", &self.engine.mode())
            .field("status", &self.status())
            .field("open_attempts", &self.open_attempts())
            .finish()
    }
}

fn open_blocking(engine: &dyn StorageEngine, attempt: u64) -> StoreResult<StoreHandle> {
    if let Err(reason) = engine.check_available() {
        warn!(
            "event=db_open module=db status=unavailable mode={} attempt={attempt} reason={}",
            engine.mode(),
            reason
        );
        return Err(StoreError::unavailable(reason));
    }

    let (conn, migration) = open_engine(engine)?;
    Ok(StoreHandle::new(conn, attempt, migration))
}

#[cfg(test)]
mod tests {
    use super::{ConnectionManager, ConnectionStatus};
    use crate::db::MemoryEngine;
    use std::sync::Arc;

    #[tokio::test]
    async fn memoizes_handle_after_first_open() {
        let manager = ConnectionManager::new(Arc::new(MemoryEngine));
        assert_eq!(manager.status(), ConnectionStatus::Unopened);

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(first.same_connection(&second));
        assert_eq!(manager.status(), ConnectionStatus::Open);
        assert_eq!(manager.open_attempts(), 1);
        assert_eq!(first.migration().applied, 1);
    }
}
