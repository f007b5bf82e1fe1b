//! Error reporting: structured logging plus optional user notification.
//!
//! # Responsibility
//! - Log every store failure with code, message, detail and timestamp.
//! - Derive a short user-facing notice and hand it to an attached sink.
//!
//! # Invariants
//! - Reporting never changes the error returned to the caller.
//! - Sinks are one-way outputs; the core does not depend on their outcome.
//! - Log lines never contain media bytes, and free text is sanitized.

use crate::error::{ErrorCode, StoreError, StoreErrorKind, StoreResult};
use crate::logging::sanitize_message;
use log::{error, warn};
use std::sync::Arc;

const MAX_LOGGED_TEXT_CHARS: usize = 240;

/// Short failure notice for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub operation: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Receiver of user-visible failure notices (toasts, status bars, ...).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Builds the user-facing notice for `error`.
///
/// Falls back to the per-code default when the error has no message.
pub fn notice_for(operation: &str, error: &StoreError) -> Notice {
    let message = if error.message().trim().is_empty() {
        error.code().default_message().to_string()
    } else {
        error.message().to_string()
    };
    Notice {
        operation: operation.to_string(),
        code: error.code(),
        message,
    }
}

/// Logs failures and forwards notices to an optional sink.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    sink: Option<Arc<dyn NotificationSink>>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Logs `error` and notifies the sink, if any.
    pub fn report(&self, operation: &str, error: &StoreError) {
        let message = sanitize_message(error.message(), MAX_LOGGED_TEXT_CHARS);
        let detail = error
            .detail()
            .map(|detail| sanitize_message(detail, MAX_LOGGED_TEXT_CHARS))
            .unwrap_or_else(|| "none".to_string());
        let stage = match error.kind() {
            StoreErrorKind::Storage(stage) => stage.as_str(),
            StoreErrorKind::Validation(_) => "validate",
            StoreErrorKind::StorageUnavailable => "capability",
            StoreErrorKind::Unknown => "unknown",
        };

        if matches!(error.kind(), StoreErrorKind::Validation(_)) {
            warn!(
                "event=store_error module=report operation={operation} stage={stage} code={} message={message} detail={detail} timestamp={}",
                error.code(),
                error.timestamp().to_rfc3339()
            );
        } else {
            error!(
                "event=store_error module=report operation={operation} stage={stage} code={} message={message} detail={detail} timestamp={}",
                error.code(),
                error.timestamp().to_rfc3339()
            );
        }

        if let Some(sink) = &self.sink {
            sink.notify(&notice_for(operation, error));
        }
    }

    /// Reports the error case of `result` and passes `result` through.
    pub fn observe<T>(&self, operation: &str, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            self.report(operation, err);
        }
        result
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("has_sink", &self.has_sink())
            .finish()
    }
}
