//! Book repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide save/list/get/delete/clear over the `books` table.
//! - Resolve insert-versus-update before any SQL runs.
//!
//! # Invariants
//! - Every write is one SQL statement.
//! - Ids come from `AUTOINCREMENT`: monotonic and never reused.
//! - A stored `created_at` is never overwritten by an update.

use crate::codec::{self, StorageRecord};
use crate::model::book::{Book, BookId};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BOOK_SELECT_SQL: &str = "SELECT
    id,
    title,
    pages,
    created_at,
    updated_at
FROM books";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for book persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(rusqlite::Error),
    Encode(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(message) => write!(f, "failed to encode book pages: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted book data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(value)
    }
}

/// Column values of one book row, encoded for SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    title: String,
    pages: Vec<u8>,
    created_at: String,
    updated_at: String,
}

impl EncodedRecord {
    pub fn encode(record: &StorageRecord) -> RepoResult<Self> {
        let pages =
            codec::encode_pages(&record.pages).map_err(|err| RepoError::Encode(err.to_string()))?;
        Ok(Self {
            title: record.title.clone(),
            pages,
            created_at: codec::format_timestamp(record.created_at),
            updated_at: codec::format_timestamp(record.updated_at),
        })
    }

    /// Size of the encoded page column in bytes.
    pub fn pages_len(&self) -> usize {
        self.pages.len()
    }
}

/// Save variant, decided from the candidate id before the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOp {
    Insert(EncodedRecord),
    Update { id: BookId, record: EncodedRecord },
}

impl SaveOp {
    pub fn resolve(id: Option<BookId>, record: EncodedRecord) -> Self {
        match id {
            Some(id) => Self::Update { id, record },
            None => Self::Insert(record),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update { .. } => "update",
        }
    }
}

/// Repository interface for book CRUD operations.
pub trait BookRepository {
    /// Writes the record and returns its id.
    fn save(&self, op: &SaveOp) -> RepoResult<BookId>;
    /// Returns every book in key order.
    fn list(&self) -> RepoResult<Vec<Book>>;
    fn get(&self, id: BookId) -> RepoResult<Option<Book>>;
    /// Returns the number of removed rows (0 or 1).
    fn delete(&self, id: BookId) -> RepoResult<usize>;
    /// Returns the number of removed rows.
    fn clear(&self) -> RepoResult<usize>;
    fn count(&self) -> RepoResult<u64>;
}

/// SQLite-backed book repository.
pub struct SqliteBookRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn save(&self, op: &SaveOp) -> RepoResult<BookId> {
        match op {
            SaveOp::Insert(record) => {
                self.conn.execute(
                    "INSERT INTO books (title, pages, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![
                        record.title.as_str(),
                        record.pages.as_slice(),
                        record.created_at.as_str(),
                        record.updated_at.as_str(),
                    ],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
            SaveOp::Update { id, record } => {
                self.conn.execute(
                    "INSERT INTO books (id, title, pages, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT (id) DO UPDATE SET
                        title = excluded.title,
                        pages = excluded.pages,
                        updated_at = max(books.created_at, excluded.updated_at);",
                    params![
                        id,
                        record.title.as_str(),
                        record.pages.as_slice(),
                        record.created_at.as_str(),
                        record.updated_at.as_str(),
                    ],
                )?;
                Ok(*id)
            }
        }
    }

    fn list(&self) -> RepoResult<Vec<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BOOK_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut books = Vec::new();

        while let Some(row) = rows.next()? {
            books.push(parse_book_row(row)?);
        }

        Ok(books)
    }

    fn get(&self, id: BookId) -> RepoResult<Option<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BOOK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_book_row(row)?));
        }

        Ok(None)
    }

    fn delete(&self, id: BookId) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM books WHERE id = ?1;", [id])?;
        Ok(removed)
    }

    fn clear(&self) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM books;", [])?;
        Ok(removed)
    }

    fn count(&self) -> RepoResult<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM books;", [], |row| row.get::<_, i64>(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }
}

fn parse_book_row(row: &Row<'_>) -> RepoResult<Book> {
    let id: BookId = row.get("id")?;

    let pages_blob: Vec<u8> = row.get("pages")?;
    let pages = codec::decode_pages(&pages_blob).map_err(|err| {
        RepoError::InvalidData(format!("invalid pages blob for book {id}: {err}"))
    })?;

    let created_at = parse_timestamp_column(row, id, "created_at")?;
    let updated_at = parse_timestamp_column(row, id, "updated_at")?;

    let record = StorageRecord {
        title: row.get("title")?,
        pages,
        created_at,
        updated_at,
    };
    Ok(codec::reconstruct(id, record))
}

fn parse_timestamp_column(
    row: &Row<'_>,
    id: BookId,
    column: &str,
) -> RepoResult<chrono::DateTime<chrono::Utc>> {
    let text: String = row.get(column)?;
    codec::parse_timestamp(&text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{text}` in books.{column} for book {id}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{BookRepository, EncodedRecord, RepoError, SaveOp, SqliteBookRepository};
    use crate::codec::normalize;
    use crate::db::open_db_in_memory;
    use crate::model::book::{BookInput, Page};
    use chrono::{Duration, TimeZone, Utc};

    fn encoded(title: &str) -> EncodedRecord {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        let input = BookInput::new(title, vec![Page::with_image(b"img".to_vec())]);
        EncodedRecord::encode(&normalize(&input, now)).unwrap()
    }

    #[test]
    fn insert_issues_increasing_ids() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteBookRepository::new(&conn);

        let first = repo.save(&SaveOp::resolve(None, encoded("one"))).unwrap();
        let second = repo.save(&SaveOp::resolve(None, encoded("two"))).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn update_with_unknown_id_inserts_at_that_key() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteBookRepository::new(&conn);

        let op = SaveOp::resolve(Some(42), encoded("explicit"));
        assert_eq!(op.label(), "update");
        assert_eq!(repo.save(&op).unwrap(), 42);
        assert_eq!(repo.get(42).unwrap().unwrap().title, "explicit");

        let next = repo.save(&SaveOp::resolve(None, encoded("after"))).unwrap();
        assert_eq!(next, 43);
    }

    #[test]
    fn update_keeps_stored_created_at() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteBookRepository::new(&conn);
        let id = repo.save(&SaveOp::resolve(None, encoded("first"))).unwrap();
        let original = repo.get(id).unwrap().unwrap();

        let later = original.created_at + Duration::hours(1);
        let input = BookInput::new("renamed", vec![Page::with_audio(b"a".to_vec())]);
        let record = EncodedRecord::encode(&normalize(&input, later)).unwrap();
        repo.save(&SaveOp::resolve(Some(id), record)).unwrap();

        let updated = repo.get(id).unwrap().unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.pages, vec![Page::with_audio(b"a".to_vec())]);
    }

    #[test]
    fn delete_and_clear_report_removed_rows() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteBookRepository::new(&conn);
        let id = repo.save(&SaveOp::resolve(None, encoded("a"))).unwrap();
        repo.save(&SaveOp::resolve(None, encoded("b"))).unwrap();

        assert_eq!(repo.delete(id).unwrap(), 1);
        assert_eq!(repo.delete(id).unwrap(), 0);
        assert_eq!(repo.clear().unwrap(), 1);
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn malformed_rows_are_rejected_on_read() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO books (title, pages, created_at, updated_at)
             VALUES ('bad', x'FF', 'not-a-time', 'not-a-time');",
            [],
        )
        .unwrap();
        let repo = SqliteBookRepository::new(&conn);

        let err = repo.list().unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }
}
