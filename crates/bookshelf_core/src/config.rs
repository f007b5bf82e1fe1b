//! Store configuration.
//!
//! # Responsibility
//! - Describe where the book database lives and which size limits apply.
//! - Resolve configuration from environment variables for embedders.

use crate::db::{FileEngine, MemoryEngine, StorageEngine, DB_NAME};
use crate::validate::ValidationLimits;
use std::path::PathBuf;
use std::sync::Arc;

pub const DB_PATH_ENV: &str = "BOOKSHELF_DB_PATH";
pub const MAX_PAYLOAD_BYTES_ENV: &str = "BOOKSHELF_MAX_PAYLOAD_BYTES";
pub const MAX_TITLE_CHARS_ENV: &str = "BOOKSHELF_MAX_TITLE_CHARS";
pub const LOG_LEVEL_ENV: &str = "BOOKSHELF_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: StoreLocation,
    pub limits: ValidationLimits,
}

impl StoreConfig {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            limits: ValidationLimits::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            limits: ValidationLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Reads `BOOKSHELF_DB_PATH` and the optional limit variables.
    ///
    /// Blank or unparsable limit values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = lookup(DB_PATH_ENV)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let parse_limit = |key: &str| {
            lookup(key).and_then(|raw| raw.trim().parse::<usize>().ok())
        };

        Self::at_path(path).with_limits(ValidationLimits {
            max_title_chars: parse_limit(MAX_TITLE_CHARS_ENV),
            max_payload_bytes: parse_limit(MAX_PAYLOAD_BYTES_ENV),
        })
    }

    /// Builds the storage engine for this location.
    pub fn engine(&self) -> Arc<dyn StorageEngine> {
        match &self.location {
            StoreLocation::File(path) => Arc::new(FileEngine::new(path.clone())),
            StoreLocation::Memory => Arc::new(MemoryEngine),
        }
    }
}

/// Default database file: `<temp_dir>/baby-bookshelf.sqlite3`.
pub fn default_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("{DB_NAME}.sqlite3"))
}

/// Log level from `BOOKSHELF_LOG_LEVEL`, else the build-mode default.
pub fn log_level_from_env() -> String {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| crate::logging::default_log_level().to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        default_db_path, StoreConfig, StoreLocation, DB_PATH_ENV, MAX_PAYLOAD_BYTES_ENV,
        MAX_TITLE_CHARS_ENV,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_temp_dir_file_without_limits() {
        let config = StoreConfig::from_lookup(lookup_from(&[(DB_PATH_ENV, "   ")]));
        assert_eq!(config.location, StoreLocation::File(default_db_path()));
        assert_eq!(config.limits.max_payload_bytes, None);
        assert!(default_db_path().ends_with("baby-bookshelf.sqlite3"));
    }

    #[test]
    fn reads_path_and_limits() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (DB_PATH_ENV, " /data/books.sqlite3 "),
            (MAX_PAYLOAD_BYTES_ENV, "1024"),
            (MAX_TITLE_CHARS_ENV, "not-a-number"),
        ]));
        assert_eq!(
            config.location,
            StoreLocation::File(PathBuf::from("/data/books.sqlite3"))
        );
        assert_eq!(config.limits.max_payload_bytes, Some(1024));
        assert_eq!(config.limits.max_title_chars, None);
    }

    #[test]
    fn engine_matches_location() {
        assert_eq!(StoreConfig::in_memory().engine().mode(), "memory");
        assert_eq!(StoreConfig::at_path("/tmp/x.sqlite3").engine().mode(), "file");
    }
}
