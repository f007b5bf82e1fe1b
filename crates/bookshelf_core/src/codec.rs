//! Record codec between caller candidates and stored rows.
//!
//! # Responsibility
//! - Normalize a validated candidate into its storage record.
//! - Rebuild domain books from stored records.
//! - Encode embedded pages into the single `pages` column.
//! - Convert untyped JSON candidates into `BookInput`.
//!
//! # Invariants
//! - Media payloads pass through byte-for-byte.
//! - `updated_at` is stamped on every normalization; `created_at` is kept
//!   when the candidate already has one.
//! - Timestamps are stored as RFC 3339 UTC text with microsecond precision,
//!   so text order equals time order.

use crate::error::ValidationError;
use crate::model::book::{Book, BookId, BookInput, Page};
use bincode::config::{self, Configuration};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Normalized book ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub title: String,
    pub pages: Vec<Page>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalizes a candidate using `now` as the save time.
///
/// A `created_at` in the future relative to `now` pulls `updated_at` forward
/// so the stored record never has `updated_at < created_at`.
pub fn normalize(input: &BookInput, now: DateTime<Utc>) -> StorageRecord {
    let created_at = input.created_at.unwrap_or(now);
    StorageRecord {
        title: input.title.trim().to_string(),
        pages: input
            .pages
            .iter()
            .map(|page| Page::new(page.image.clone(), page.audio.clone()))
            .collect(),
        created_at,
        updated_at: now.max(created_at),
    }
}

/// Rebuilds the domain book for a stored record.
pub fn reconstruct(id: BookId, record: StorageRecord) -> Book {
    Book {
        id,
        title: record.title,
        pages: record.pages,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn pages_config() -> Configuration {
    config::standard()
}

pub(crate) fn encode_pages(pages: &[Page]) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::encode_to_vec(pages, pages_config())
}

pub(crate) fn decode_pages(bytes: &[u8]) -> Result<Vec<Page>, String> {
    let (pages, consumed): (Vec<Page>, usize) =
        bincode::decode_from_slice(bytes, pages_config()).map_err(|err| err.to_string())?;
    if consumed != bytes.len() {
        return Err(format!(
            "{} trailing bytes after page list",
            bytes.len() - consumed
        ));
    }
    Ok(pages)
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|parsed| parsed.with_timezone(&Utc))
}

/// Converts an untyped JSON candidate into `BookInput`.
///
/// Structural checks run in validation priority order: object, title,
/// pages, then each page. Media may be a string (stored as its UTF-8 bytes),
/// an array of byte values, or `null`/absent. Remaining invariants are left
/// to [`crate::validate::validate`].
pub fn input_from_json(value: &Value) -> Result<BookInput, ValidationError> {
    let Value::Object(fields) = value else {
        return Err(ValidationError::NotAnObject);
    };

    let Some(Value::String(title)) = fields.get("title") else {
        return Err(ValidationError::MissingTitle);
    };

    let pages = match fields.get("pages") {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(index, item)| page_from_json(index, item))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(ValidationError::MissingPages),
    };

    let id = match fields.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => {
            Some(number.as_i64().ok_or_else(|| ValidationError::InvalidField {
                field: "id",
                reason: format!("`{number}` is not an integer"),
            })?)
        }
        Some(_) => {
            return Err(ValidationError::InvalidField {
                field: "id",
                reason: "expected an integer".to_string(),
            })
        }
    };

    let created_at = match fields.get("createdAt") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            Some(
                parse_timestamp(text).map_err(|err| ValidationError::InvalidField {
                    field: "createdAt",
                    reason: err.to_string(),
                })?,
            )
        }
        Some(_) => {
            return Err(ValidationError::InvalidField {
                field: "createdAt",
                reason: "expected an RFC 3339 string".to_string(),
            })
        }
    };

    Ok(BookInput {
        id,
        title: title.clone(),
        pages,
        created_at,
    })
}

fn page_from_json(index: usize, value: &Value) -> Result<Page, ValidationError> {
    let Value::Object(fields) = value else {
        return Err(ValidationError::InvalidPage {
            index,
            reason: "not an object".to_string(),
        });
    };

    Ok(Page::new(
        media_from_json(index, fields, "image")?,
        media_from_json(index, fields, "audio")?,
    ))
}

fn media_from_json(
    index: usize,
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<Vec<u8>>, ValidationError> {
    let invalid = || ValidationError::InvalidPage {
        index,
        reason: format!("`{key}` must be a string, a byte array or null"),
    };

    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.as_bytes().to_vec())),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(invalid)
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}
