//! Storage engine capability.
//!
//! # Responsibility
//! - Decide whether persistent storage is usable before the first open.
//! - Produce raw SQLite connections for the connection manager.

use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Persistent storage capability consumed by [`super::ConnectionManager`].
///
/// `connect` is called from a blocking worker thread, at most once per open
/// attempt.
pub trait StorageEngine: Send + Sync {
    /// Short label used in diagnostics (`file`, `memory`, ...).
    fn mode(&self) -> &'static str;

    /// Returns a human-readable reason when storage cannot be used at all.
    fn check_available(&self) -> Result<(), String>;

    fn connect(&self) -> rusqlite::Result<Connection>;
}

/// SQLite database file on local disk.
#[derive(Debug, Clone)]
pub struct FileEngine {
    path: PathBuf,
}

impl FileEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageEngine for FileEngine {
    fn mode(&self) -> &'static str {
        "file"
    }

    fn check_available(&self) -> Result<(), String> {
        if self.path.is_dir() {
            return Err(format!(
                "database path `{}` is a directory",
                self.path.display()
            ));
        }

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let metadata = std::fs::metadata(parent).map_err(|err| {
            format!(
                "storage directory `{}` is not accessible: {err}",
                parent.display()
            )
        })?;
        if !metadata.is_dir() {
            return Err(format!(
                "storage location `{}` is not a directory",
                parent.display()
            ));
        }
        if metadata.permissions().readonly() {
            return Err(format!(
                "storage directory `{}` is read-only",
                parent.display()
            ));
        }

        Ok(())
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.path)
    }
}

/// Private in-memory database; its contents live as long as the connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryEngine;

impl StorageEngine for MemoryEngine {
    fn mode(&self) -> &'static str {
        "memory"
    }

    fn check_available(&self) -> Result<(), String> {
        Ok(())
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open_in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::{FileEngine, MemoryEngine, StorageEngine};

    #[test]
    fn file_engine_requires_existing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileEngine::new(dir.path().join("missing").join("books.sqlite3"));
        let reason = engine.check_available().unwrap_err();
        assert!(reason.contains("not accessible"));
    }

    #[test]
    fn file_engine_rejects_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileEngine::new(dir.path());
        assert!(engine.check_available().unwrap_err().contains("is a directory"));
    }

    #[test]
    fn file_engine_accepts_new_file_in_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileEngine::new(dir.path().join("books.sqlite3"));
        engine.check_available().unwrap();
        let conn = engine.connect().unwrap();
        conn.execute_batch("CREATE TABLE touch (id INTEGER);").unwrap();
        assert!(engine.path().exists());
    }

    #[test]
    fn memory_engine_is_always_available() {
        MemoryEngine.check_available().unwrap();
        assert_eq!(MemoryEngine.mode(), "memory");
    }
}
