//! Process-wide book store entry points.
//!
//! # Responsibility
//! - Own the default `BookService` for the whole process.
//! - Expose the five CRUD calls as free async functions.
//!
//! # Invariants
//! - The default service is created at most once; its connection is opened
//!   lazily on the first CRUD call and kept until process exit.
//! - `configure` only succeeds before the default service exists.

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::model::book::{Book, BookId, BookInput};
use crate::report::{ErrorReporter, NotificationSink};
use crate::service::book_service::BookService;
use log::info;
use once_cell::sync::OnceCell;
use std::sync::Arc;

static DEFAULT_SERVICE: OnceCell<BookService> = OnceCell::new();

/// Installs the configuration (and optional notification sink) used by the
/// process-wide store.
///
/// # Errors
/// - Returns an error when the default store was already configured or
///   already used.
pub fn configure(
    config: StoreConfig,
    sink: Option<Arc<dyn NotificationSink>>,
) -> Result<(), String> {
    let reporter = match sink {
        Some(sink) => ErrorReporter::with_sink(sink),
        None => ErrorReporter::new(),
    };
    let service = BookService::new(&config).with_reporter(reporter);

    DEFAULT_SERVICE
        .set(service)
        .map_err(|_| "default book store is already initialized".to_string())?;
    info!(
        "event=store_configure module=api status=ok location={:?}",
        config.location
    );
    Ok(())
}

/// Returns the process-wide service, building it from the environment if
/// `configure` was never called.
pub fn default_service() -> &'static BookService {
    DEFAULT_SERVICE.get_or_init(|| BookService::new(&StoreConfig::from_env()))
}

pub async fn save_book(book: &BookInput) -> StoreResult<BookId> {
    default_service().save_book(book).await
}

pub async fn get_books() -> StoreResult<Vec<Book>> {
    default_service().get_books().await
}

pub async fn get_book_by_id(id: BookId) -> StoreResult<Option<Book>> {
    default_service().get_book_by_id(id).await
}

pub async fn delete_book(id: BookId) -> StoreResult<bool> {
    default_service().delete_book(id).await
}

pub async fn clear_all_books() -> StoreResult<bool> {
    default_service().clear_all_books().await
}
