//! Async book CRUD service.
//!
//! # Responsibility
//! - Provide save/list/get/delete/clear entry points for callers.
//! - Run each operation as exactly one transaction on the shared handle.
//! - Report every failure through the error reporter before returning it.
//!
//! # Invariants
//! - Validation failures return before a connection is acquired.
//! - The handle is borrowed per call and never cached here.
//! - Blocking SQLite work runs on the blocking pool, never on the caller's
//!   task.

use crate::codec;
use crate::config::StoreConfig;
use crate::db::{ConnectionManager, StorageEngine, TxMode};
use crate::error::{StorageStage, StoreError, StoreResult};
use crate::model::book::{Book, BookId, BookInput, BookSummary, Page};
use crate::repo::book_repo::{
    BookRepository, EncodedRecord, RepoError, RepoResult, SaveOp, SqliteBookRepository,
};
use crate::report::ErrorReporter;
use crate::validate::{require_id, validate, ValidationLimits};
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

const SELF_CHECK_TITLE: &str = "storage self-check";

/// Use-case service over the book store.
#[derive(Debug)]
pub struct BookService {
    connections: ConnectionManager,
    limits: ValidationLimits,
    reporter: ErrorReporter,
}

impl BookService {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_engine(config.engine(), config.limits)
    }

    pub fn with_engine(engine: Arc<dyn StorageEngine>, limits: ValidationLimits) -> Self {
        Self {
            connections: ConnectionManager::new(engine),
            limits,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Validates, normalizes and upserts `input`, returning its id.
    ///
    /// Without an id the book is inserted and gets a new id; with an id the
    /// stored record is overwritten while keeping its `created_at`.
    pub async fn save_book(&self, input: &BookInput) -> StoreResult<BookId> {
        let result = self.save_inner(input).await;
        self.reporter.observe("book_save", result)
    }

    /// Lists every stored book in id order.
    pub async fn get_books(&self) -> StoreResult<Vec<Book>> {
        let started_at = Instant::now();
        let result = self
            .run(TxMode::ReadOnly, "failed to load books", |repo| repo.list())
            .await
            .inspect(|books| {
                info!(
                    "event=book_list module=store status=ok count={} duration_ms={}",
                    books.len(),
                    started_at.elapsed().as_millis()
                );
            });
        self.reporter.observe("book_list", result)
    }

    /// Looks up one book; `Ok(None)` when no such id exists.
    pub async fn get_book_by_id(&self, id: BookId) -> StoreResult<Option<Book>> {
        let result = self.get_inner(id).await;
        self.reporter.observe("book_get", result)
    }

    /// Deletes one book. Deleting a missing id still succeeds.
    pub async fn delete_book(&self, id: BookId) -> StoreResult<bool> {
        let result = self.delete_inner(id).await;
        self.reporter.observe("book_delete", result)
    }

    /// Removes every book.
    pub async fn clear_all_books(&self) -> StoreResult<bool> {
        let started_at = Instant::now();
        let result = self
            .run(TxMode::ReadWrite, "failed to clear books", |repo| repo.clear())
            .await
            .map(|removed| {
                info!(
                    "event=book_clear module=store status=ok removed={removed} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                true
            });
        self.reporter.observe("book_clear", result)
    }

    /// Number of stored books.
    pub async fn count_books(&self) -> StoreResult<u64> {
        let result = self
            .run(TxMode::ReadOnly, "failed to count books", |repo| repo.count())
            .await;
        self.reporter.observe("book_count", result)
    }

    /// Saves a probe book, reads it back through a full scan and deletes it.
    ///
    /// Returns `false` instead of an error so callers can use it as a health
    /// probe.
    pub async fn self_check(&self) -> bool {
        let probe = BookInput::new(
            SELF_CHECK_TITLE,
            vec![Page::blank(), Page::with_image(b"self-check".to_vec())],
        );

        let outcome: StoreResult<bool> = async {
            let id = self.save_book(&probe).await?;
            let found = self
                .get_books()
                .await?
                .into_iter()
                .any(|book| book.id == id && book.title == SELF_CHECK_TITLE);
            self.delete_book(id).await?;
            Ok(found)
        }
        .await;

        match outcome {
            Ok(true) => {
                info!("event=self_check module=store status=ok");
                true
            }
            Ok(false) => {
                warn!("event=self_check module=store status=error reason=probe_not_found");
                false
            }
            Err(err) => {
                warn!(
                    "event=self_check module=store status=error error_code={}",
                    err.code()
                );
                false
            }
        }
    }

    async fn save_inner(&self, input: &BookInput) -> StoreResult<BookId> {
        let started_at = Instant::now();
        validate(input, &self.limits)?;

        let record = codec::normalize(input, Utc::now());
        let encoded = EncodedRecord::encode(&record)
            .map_err(|err| repo_failure("failed to save book", err))?;
        let op = SaveOp::resolve(input.id, encoded);
        let mode = op.label();

        let summary = BookSummary::from(input);
        debug!(
            "event=book_save module=store status=start mode={mode} page_count={} pages_with_image={} pages_with_audio={}",
            summary.page_count, summary.pages_with_image, summary.pages_with_audio
        );

        let id = self
            .run(TxMode::ReadWrite, "failed to save book", move |repo| {
                repo.save(&op)
            })
            .await?;

        info!(
            "event=book_save module=store status=ok mode={mode} book_id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(id)
    }

    async fn get_inner(&self, id: BookId) -> StoreResult<Option<Book>> {
        let started_at = Instant::now();
        let id = require_id(id)?;

        let book = self
            .run(TxMode::ReadOnly, "failed to load book", move |repo| {
                repo.get(id)
            })
            .await?;

        info!(
            "event=book_get module=store status=ok book_id={id} found={} duration_ms={}",
            book.is_some(),
            started_at.elapsed().as_millis()
        );
        Ok(book)
    }

    async fn delete_inner(&self, id: BookId) -> StoreResult<bool> {
        let started_at = Instant::now();
        let id = require_id(id)?;

        let removed = self
            .run(TxMode::ReadWrite, "failed to delete book", move |repo| {
                repo.delete(id)
            })
            .await?;

        info!(
            "event=book_delete module=store status=ok book_id={id} removed={removed} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(true)
    }

    /// Acquires the handle and runs `body` in one transaction of `mode`.
    async fn run<T, F>(&self, mode: TxMode, failure: &'static str, body: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteBookRepository<'_>) -> RepoResult<T> + Send + 'static,
    {
        let handle = self.connections.acquire().await?;

        let joined = tokio::task::spawn_blocking(move || {
            handle.transaction(mode, |tx| body(&SqliteBookRepository::new(tx)))
        })
        .await;

        match joined {
            Ok(result) => result.map_err(|err| repo_failure(failure, err)),
            Err(err) => Err(StoreError::unknown(
                failure,
                format!("{} transaction task failed: {err}", mode.as_str()),
            )),
        }
    }
}

fn repo_failure(message: &'static str, err: RepoError) -> StoreError {
    let stage = match &err {
        RepoError::Db(_) => StorageStage::Transaction,
        RepoError::Encode(_) => StorageStage::Encode,
        RepoError::InvalidData(_) => StorageStage::Decode,
    };
    StoreError::storage(stage, message, err)
}
