//! Book candidate validation.
//!
//! # Responsibility
//! - Reject candidates that violate book invariants before any storage work.
//! - Report content-free pages as warnings without failing the book.
//!
//! # Invariants
//! - Checks run in a fixed priority order and stop at the first violation:
//!   title, pages, per-page checks, whole-book content, then size limits.
//! - Validation never mutates its input.

use crate::error::{MediaKind, ValidationError};
use crate::model::book::{BookId, BookInput, Page};
use log::warn;

/// Optional size limits applied after the structural invariants.
///
/// `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_title_chars: Option<usize>,
    pub max_payload_bytes: Option<usize>,
}

/// Validates a save candidate.
///
/// # Errors
/// - `MissingTitle` when the trimmed title is empty.
/// - `MissingPages` when the book has no pages.
/// - `NoPageWithContent` when every page lacks image and audio.
/// - `TitleTooLong` / `PayloadTooLarge` when `limits` are exceeded.
/// - `InvalidId` when an explicit id is not positive.
pub fn validate(input: &BookInput, limits: &ValidationLimits) -> Result<(), ValidationError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    if input.pages.is_empty() {
        return Err(ValidationError::MissingPages);
    }

    for index in pages_without_media(&input.pages) {
        warn!(
            "event=book_validate module=validate status=warn page={} reason=page_without_media",
            index + 1
        );
    }

    if !input.pages.iter().any(Page::has_content) {
        return Err(ValidationError::NoPageWithContent);
    }

    if let Some(id) = input.id {
        require_id(id)?;
    }

    check_limits(title, &input.pages, limits)
}

/// Returns 0-based indices of pages with neither image nor audio.
pub fn pages_without_media(pages: &[Page]) -> Vec<usize> {
    pages
        .iter()
        .enumerate()
        .filter(|(_, page)| !page.has_content())
        .map(|(index, _)| index)
        .collect()
}

/// Rejects ids that the storage engine can never have issued.
pub fn require_id(id: BookId) -> Result<BookId, ValidationError> {
    if id <= 0 {
        return Err(ValidationError::InvalidId(id));
    }
    Ok(id)
}

fn check_limits(
    title: &str,
    pages: &[Page],
    limits: &ValidationLimits,
) -> Result<(), ValidationError> {
    if let Some(max_chars) = limits.max_title_chars {
        let actual_chars = title.chars().count();
        if actual_chars > max_chars {
            return Err(ValidationError::TitleTooLong {
                max_chars,
                actual_chars,
            });
        }
    }

    let Some(max_bytes) = limits.max_payload_bytes else {
        return Ok(());
    };
    for (index, page) in pages.iter().enumerate() {
        for (media, payload) in [
            (MediaKind::Image, page.image.as_deref()),
            (MediaKind::Audio, page.audio.as_deref()),
        ] {
            let actual_bytes = payload.map_or(0, <[u8]>::len);
            if actual_bytes > max_bytes {
                return Err(ValidationError::PayloadTooLarge {
                    index,
                    media,
                    max_bytes,
                    actual_bytes,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{pages_without_media, require_id, validate, ValidationLimits};
    use crate::error::{MediaKind, ValidationError};
    use crate::model::book::{BookInput, Page};

    fn limits() -> ValidationLimits {
        ValidationLimits::default()
    }

    #[test]
    fn accepts_book_with_one_content_page_among_blanks() {
        let input = BookInput::new(
            "Sleepy Bear",
            vec![Page::blank(), Page::with_image(b"bear".to_vec())],
        );
        validate(&input, &limits()).unwrap();
        assert_eq!(pages_without_media(&input.pages), vec![0]);
    }

    #[test]
    fn title_is_checked_before_pages() {
        let input = BookInput::new("   ", Vec::new());
        assert_eq!(
            validate(&input, &limits()).unwrap_err(),
            ValidationError::MissingTitle
        );
    }

    #[test]
    fn rejects_book_without_pages() {
        let input = BookInput::new("Blank", Vec::new());
        assert_eq!(
            validate(&input, &limits()).unwrap_err(),
            ValidationError::MissingPages
        );
    }

    #[test]
    fn rejects_book_where_every_page_is_empty() {
        let input = BookInput::new(
            "Empty",
            vec![Page::blank(), Page::new(Some(Vec::new()), None)],
        );
        let err = validate(&input, &limits()).unwrap_err();
        assert_eq!(err, ValidationError::NoPageWithContent);
        assert!(err.to_string().contains("at least one page with content"));
    }

    #[test]
    fn rejects_non_positive_explicit_id() {
        let mut input = BookInput::new("Ids", vec![Page::with_audio(b"la".to_vec())]);
        input.id = Some(0);
        assert_eq!(
            validate(&input, &limits()).unwrap_err(),
            ValidationError::InvalidId(0)
        );
        assert_eq!(require_id(3).unwrap(), 3);
        assert!(require_id(-1).is_err());
    }

    #[test]
    fn limits_apply_to_trimmed_title_and_each_payload() {
        let input = BookInput::new(
            "  abcd  ",
            vec![Page::new(Some(vec![0; 4]), Some(vec![0; 9]))],
        );
        let tight_title = ValidationLimits {
            max_title_chars: Some(3),
            max_payload_bytes: None,
        };
        assert!(matches!(
            validate(&input, &tight_title).unwrap_err(),
            ValidationError::TitleTooLong {
                max_chars: 3,
                actual_chars: 4
            }
        ));

        let tight_payload = ValidationLimits {
            max_title_chars: Some(4),
            max_payload_bytes: Some(8),
        };
        assert!(matches!(
            validate(&input, &tight_payload).unwrap_err(),
            ValidationError::PayloadTooLarge {
                index: 0,
                media: MediaKind::Audio,
                ..
            }
        ));
    }

    #[test]
    fn validation_does_not_mutate_input() {
        let input = BookInput::new("  Keep me  ", vec![Page::with_image(b"x".to_vec())]);
        let before = input.clone();
        validate(&input, &limits()).unwrap();
        assert_eq!(input, before);
    }
}
