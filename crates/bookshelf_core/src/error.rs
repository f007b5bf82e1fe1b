//! Error taxonomy for the book store.
//!
//! # Responsibility
//! - Classify every failure as validation, storage-unavailable or storage.
//! - Carry a human-readable message separate from the raw engine detail.
//!
//! # Invariants
//! - Validation errors are produced before any connection or transaction.
//! - "Not found" is never an error; reads return `None` instead.
//! - Errors are `Clone` so one failed open attempt can be delivered to every
//!   coalesced waiter.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Media slot of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

/// Violated book invariant.
///
/// Page indices are 0-based; messages render them 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NotAnObject,
    MissingTitle,
    MissingPages,
    InvalidPage {
        index: usize,
        reason: String,
    },
    NoPageWithContent,
    InvalidId(i64),
    InvalidField {
        field: &'static str,
        reason: String,
    },
    TitleTooLong {
        max_chars: usize,
        actual_chars: usize,
    },
    PayloadTooLarge {
        index: usize,
        media: MediaKind,
        max_bytes: usize,
        actual_bytes: usize,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "book data is not an object"),
            Self::MissingTitle => write!(f, "book title cannot be empty"),
            Self::MissingPages => write!(f, "book must contain at least one page"),
            Self::InvalidPage { index, reason } => {
                write!(f, "page {} is invalid: {reason}", index + 1)
            }
            Self::NoPageWithContent => write!(
                f,
                "book must contain at least one page with content (image or audio)"
            ),
            Self::InvalidId(id) => write!(f, "book id must be a positive integer, got {id}"),
            Self::InvalidField { field, reason } => write!(f, "invalid `{field}`: {reason}"),
            Self::TitleTooLong {
                max_chars,
                actual_chars,
            } => write!(
                f,
                "book title cannot exceed {max_chars} characters (got {actual_chars})"
            ),
            Self::PayloadTooLarge {
                index,
                media,
                max_bytes,
                actual_bytes,
            } => write!(
                f,
                "page {} {} cannot exceed {max_bytes} bytes (got {actual_bytes})",
                index + 1,
                media.as_str()
            ),
        }
    }
}

impl Error for ValidationError {}

/// Point in the storage pipeline where an engine failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStage {
    Open,
    Migration,
    Transaction,
    Encode,
    Decode,
}

impl StorageStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Migration => "migration",
            Self::Transaction => "transaction",
            Self::Encode => "encode",
            Self::Decode => "decode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreErrorKind {
    Validation(ValidationError),
    StorageUnavailable,
    Storage(StorageStage),
    /// Failure outside the storage pipeline, such as a crashed worker task.
    Unknown,
}

/// Stable machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Validation,
    StorageUnavailable,
    Storage,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
            Self::Storage => "STORAGE_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Default user-facing message for this code.
    pub fn default_message(self) -> &'static str {
        match self {
            Self::Validation => "The book data does not meet the requirements.",
            Self::StorageUnavailable => "Local storage is not available on this device.",
            Self::Storage => "Saving data failed, please try again.",
            Self::Unknown => "Something went wrong, please try again.",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-level failure returned by every public operation.
#[derive(Debug, Clone)]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
    detail: Option<String>,
    timestamp: DateTime<Utc>,
}

impl StoreError {
    pub fn validation(err: ValidationError) -> Self {
        Self {
            message: err.to_string(),
            kind: StoreErrorKind::Validation(err),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::StorageUnavailable,
            message: "persistent storage is unavailable".to_string(),
            detail: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }

    /// Storage failure with a caller-facing `message` and the raw engine
    /// message as `detail`.
    pub fn storage(stage: StorageStage, message: impl Into<String>, detail: impl Display) -> Self {
        Self {
            kind: StoreErrorKind::Storage(stage),
            message: message.into(),
            detail: Some(detail.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn unknown(message: impl Into<String>, detail: impl Display) -> Self {
        Self {
            kind: StoreErrorKind::Unknown,
            message: message.into(),
            detail: Some(detail.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> &StoreErrorKind {
        &self.kind
    }

    pub fn code(&self) -> ErrorCode {
        match self.kind {
            StoreErrorKind::Validation(_) => ErrorCode::Validation,
            StoreErrorKind::StorageUnavailable => ErrorCode::StorageUnavailable,
            StoreErrorKind::Storage(_) => ErrorCode::Storage,
            StoreErrorKind::Unknown => ErrorCode::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        match &self.kind {
            StoreErrorKind::Validation(err) => Some(err),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<StorageStage> {
        match self.kind {
            StoreErrorKind::Storage(stage) => Some(stage),
            _ => None,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            StoreErrorKind::Validation(err) => Some(err),
            StoreErrorKind::StorageUnavailable
            | StoreErrorKind::Storage(_)
            | StoreErrorKind::Unknown => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::validation(value)
    }
}
