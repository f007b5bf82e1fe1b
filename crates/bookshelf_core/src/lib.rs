//! Core persistence logic for the bookshelf picture-book store.
//! This crate is the single source of truth for book invariants.

pub mod api;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod report;
pub mod service;
pub mod validate;

pub use api::{clear_all_books, configure, delete_book, get_book_by_id, get_books, save_book};
pub use config::{StoreConfig, StoreLocation};
pub use error::{ErrorCode, StorageStage, StoreError, StoreErrorKind, StoreResult, ValidationError};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::book::{Book, BookId, BookInput, BookSummary, Page};
pub use report::{ErrorReporter, Notice, NotificationSink};
pub use service::book_service::BookService;
pub use validate::ValidationLimits;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
