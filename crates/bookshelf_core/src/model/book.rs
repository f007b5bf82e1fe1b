//! Book and page domain records.
//!
//! # Responsibility
//! - Define the shapes exchanged between callers and the store.
//! - Provide small helpers shared by validation, codec and diagnostics.
//!
//! # Invariants
//! - `BookId` values are issued by the storage engine and are always positive.
//! - `created_at` is set once at first save and never changes afterwards.
//! - `updated_at` is never earlier than `created_at` for records written by
//!   this crate.

use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Store-issued integer identifier for a book.
pub type BookId = i64;

/// One page of a picture-book.
///
/// Either payload may be absent. An empty payload counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Page {
    pub image: Option<Vec<u8>>,
    pub audio: Option<Vec<u8>>,
}

impl Page {
    pub fn new(image: Option<Vec<u8>>, audio: Option<Vec<u8>>) -> Self {
        Self { image, audio }
    }

    /// Page carrying only an image payload.
    pub fn with_image(image: impl Into<Vec<u8>>) -> Self {
        Self::new(Some(image.into()), None)
    }

    /// Page carrying only an audio payload.
    pub fn with_audio(audio: impl Into<Vec<u8>>) -> Self {
        Self::new(None, Some(audio.into()))
    }

    /// Page with neither image nor audio.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|bytes| !bytes.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.audio.as_deref().is_some_and(|bytes| !bytes.is_empty())
    }

    /// Returns whether this page carries any non-empty media.
    pub fn has_content(&self) -> bool {
        self.has_image() || self.has_audio()
    }
}

/// Caller-side book candidate passed to `save`.
///
/// A fresh book has no `id` and no `created_at`. Passing a previously saved
/// book back (see [`Book::into_input`]) turns the save into an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookInput {
    pub id: Option<BookId>,
    pub title: String,
    pub pages: Vec<Page>,
    pub created_at: Option<DateTime<Utc>>,
}

impl BookInput {
    /// Creates a new unsaved candidate.
    pub fn new(title: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            id: None,
            title: title.into(),
            pages,
            created_at: None,
        }
    }
}

/// Persisted book record as returned by reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub pages: Vec<Page>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Converts a stored book back into a save candidate that targets the
    /// same id and keeps the original creation time.
    pub fn into_input(self) -> BookInput {
        BookInput {
            id: Some(self.id),
            title: self.title,
            pages: self.pages,
            created_at: Some(self.created_at),
        }
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: Some(self.id),
            title: self.title.clone(),
            page_count: self.pages.len(),
            pages_with_image: self.pages.iter().filter(|page| page.has_image()).count(),
            pages_with_audio: self.pages.iter().filter(|page| page.has_audio()).count(),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }
}

/// Metadata-only view of a book, safe to log or print.
///
/// Never carries media bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: Option<BookId>,
    pub title: String,
    pub page_count: usize,
    pub pages_with_image: usize,
    pub pages_with_audio: usize,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&BookInput> for BookSummary {
    fn from(input: &BookInput) -> Self {
        Self {
            id: input.id,
            title: input.title.trim().to_string(),
            page_count: input.pages.len(),
            pages_with_image: input.pages.iter().filter(|page| page.has_image()).count(),
            pages_with_audio: input.pages.iter().filter(|page| page.has_audio()).count(),
            created_at: input.created_at,
            updated_at: None,
        }
    }
}
