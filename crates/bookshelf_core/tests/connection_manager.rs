use bookshelf_core::db::{
    ConnectionManager, ConnectionStatus, FileEngine, MemoryEngine, StorageEngine,
};
use bookshelf_core::{BookInput, BookService, ErrorCode, Page, StorageStage, ValidationLimits};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory engine that counts connects and can be slowed down or made to
/// fail the first N connects.
#[derive(Default)]
struct ScriptedEngine {
    connects: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Duration,
}

impl ScriptedEngine {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl StorageEngine for ScriptedEngine {
    fn mode(&self) -> &'static str {
        "scripted"
    }

    fn check_available(&self) -> Result<(), String> {
        Ok(())
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(rusqlite::Error::InvalidPath(PathBuf::from("scripted-failure")));
        }
        Connection::open_in_memory()
    }
}

/// Engine whose storage capability can be toggled.
struct ToggleEngine {
    available: AtomicBool,
}

impl StorageEngine for ToggleEngine {
    fn mode(&self) -> &'static str {
        "toggle"
    }

    fn check_available(&self) -> Result<(), String> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("storage disabled".to_string())
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open_in_memory()
    }
}

fn content_book(title: &str) -> BookInput {
    BookInput::new(title, vec![Page::with_image(title.as_bytes().to_vec())])
}

#[tokio::test]
async fn concurrent_acquires_share_one_open_attempt() {
    let engine = Arc::new(ScriptedEngine::slow(Duration::from_millis(50)));
    let manager = ConnectionManager::new(engine.clone());

    let (first, second, third) =
        tokio::join!(manager.acquire(), manager.acquire(), manager.acquire());
    let first = first.unwrap();

    assert!(first.same_connection(&second.unwrap()));
    assert!(first.same_connection(&third.unwrap()));
    assert_eq!(engine.connects(), 1);
    assert_eq!(manager.open_attempts(), 1);
    assert_eq!(first.migration().applied, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_saves_run_exactly_one_migration() {
    let engine = Arc::new(ScriptedEngine::slow(Duration::from_millis(30)));
    let service = Arc::new(BookService::with_engine(
        engine.clone(),
        ValidationLimits::default(),
    ));

    let first = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.save_book(&content_book("Moon")).await }
    });
    let second = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.save_book(&content_book("Sun")).await }
    });

    let first_id = first.await.unwrap().unwrap();
    let second_id = second.await.unwrap().unwrap();

    assert_ne!(first_id, second_id);
    assert_eq!(engine.connects(), 1);
    assert_eq!(service.connections().open_attempts(), 1);
    let handle = service.connections().acquire().await.unwrap();
    assert_eq!(handle.migration().applied, 1);
    assert_eq!(service.get_books().await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_open_resets_state_and_next_acquire_retries() {
    let engine = Arc::new(ScriptedEngine::failing(1));
    let manager = ConnectionManager::new(engine.clone());

    let err = manager.acquire().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Storage);
    assert_eq!(err.stage(), Some(StorageStage::Open));
    assert!(err.detail().unwrap().contains("scripted-failure"));
    assert_eq!(manager.status(), ConnectionStatus::Failed);
    assert!(manager.last_error().is_some());

    let handle = manager.acquire().await.unwrap();
    assert_eq!(handle.attempt(), 2);
    assert_eq!(engine.connects(), 2);
    assert_eq!(manager.status(), ConnectionStatus::Open);
    assert!(manager.last_error().is_none());
}

#[tokio::test]
async fn coalesced_waiters_all_see_the_same_failure() {
    let engine = Arc::new(ScriptedEngine {
        failures_left: AtomicUsize::new(1),
        delay: Duration::from_millis(30),
        ..ScriptedEngine::default()
    });
    let manager = ConnectionManager::new(engine.clone());

    let (first, second) = tokio::join!(manager.acquire(), manager.acquire());
    assert!(first.is_err());
    assert!(second.is_err());
    assert_eq!(engine.connects(), 1);

    manager.acquire().await.unwrap();
    assert_eq!(manager.open_attempts(), 2);
}

#[tokio::test]
async fn missing_capability_is_storage_unavailable_and_retryable_later() {
    let engine = Arc::new(ToggleEngine {
        available: AtomicBool::new(false),
    });
    let manager = ConnectionManager::new(engine.clone());

    let err = manager.acquire().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::StorageUnavailable);
    assert_eq!(err.detail(), Some("storage disabled"));

    engine.available.store(true, Ordering::SeqCst);
    manager.acquire().await.unwrap();
    assert_eq!(manager.status(), ConnectionStatus::Open);
}

#[tokio::test]
async fn file_engine_in_missing_directory_recovers_once_directory_exists() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let manager = ConnectionManager::new(Arc::new(FileEngine::new(
        data_dir.join("baby-bookshelf.sqlite3"),
    )));

    let err = manager.acquire().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::StorageUnavailable);

    std::fs::create_dir_all(&data_dir).unwrap();
    let handle = manager.acquire().await.unwrap();
    assert_eq!(handle.attempt(), 2);
}

#[tokio::test]
async fn migration_failure_leaves_no_open_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocked.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE VIEW idx_books_created_at AS SELECT 1;")
        .unwrap();
    drop(conn);

    let manager = ConnectionManager::new(Arc::new(FileEngine::new(&path)));
    let err = manager.acquire().await.unwrap_err();
    assert_eq!(err.stage(), Some(StorageStage::Migration));
    assert_eq!(manager.status(), ConnectionStatus::Failed);

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("DROP VIEW idx_books_created_at;").unwrap();
    drop(conn);

    manager.acquire().await.unwrap();
    assert_eq!(manager.status(), ConnectionStatus::Open);
}

#[tokio::test]
async fn memory_engine_opens_lazily() {
    let manager = ConnectionManager::new(Arc::new(MemoryEngine));
    assert_eq!(manager.open_attempts(), 0);
    assert_eq!(manager.status(), ConnectionStatus::Unopened);
    manager.acquire().await.unwrap();
    assert_eq!(manager.open_attempts(), 1);
}
