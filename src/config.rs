//! Configuration types for the store.
//!
//! - [`StoreOptions`] - store-wide configuration, loadable from TOML
//! - [`ReadOptions`], [`WriteOptions`], [`ListOptions`], [`DeleteOptions`] -
//!   per-call overrides
//!
//! Empty `database`/`table` strings mean "not set" at every level; the store
//! resolves them per call (override, then configured default, then the
//! process-wide default).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default capacity of the lazy-deletion queue.
pub const DEFAULT_REAPER_QUEUE_CAPACITY: usize = 1_024;

/// Store-wide configuration.
///
/// ```toml
/// database = "myapp"
/// table = "sessions"
/// dir = "/var/lib/myapp/kv"
/// busy_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Default database identifier.
    pub database: String,
    /// Default table identifier.
    pub table: String,
    /// Base directory for database files. `None` uses [`crate::paths::get_store_dir`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// How long a connection waits on a locked database file.
    pub busy_timeout_ms: u64,
    /// Maximum number of queued lazy deletions.
    pub reaper_queue_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            database: String::new(),
            table: String::new(),
            dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            reaper_queue_capacity: DEFAULT_REAPER_QUEUE_CAPACITY,
        }
    }
}

impl StoreOptions {
    /// Sets the default database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the default table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the base directory for database files.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Busy timeout as a `Duration`.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML or unknown fields
    /// - The parsed options fail [`StoreOptions::validate`]
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| Error::io_path("reading config", path, e))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse options from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or if validation fails.
    pub fn from_toml(content: &str) -> Result<Self> {
        let options: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Check option invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `reaper_queue_capacity` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.reaper_queue_capacity == 0 {
            return Err(Error::Config(
                "reaper_queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-call options for [`crate::Store::read`].
///
/// With neither `prefix` nor `suffix` set the key is matched exactly and
/// `limit`/`offset` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub database: String,
    pub table: String,
    /// Match keys starting with the given key.
    pub prefix: bool,
    /// Match keys ending with the given key.
    pub suffix: bool,
    /// Maximum number of live records returned; zero is unbounded.
    pub limit: usize,
    /// Number of live records skipped, in descending key order.
    pub offset: usize,
}

impl ReadOptions {
    /// Read from a specific namespace.
    #[must_use]
    pub fn from_table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    /// Match by prefix.
    #[must_use]
    pub fn prefix(mut self) -> Self {
        self.prefix = true;
        self
    }

    /// Match by suffix.
    #[must_use]
    pub fn suffix(mut self) -> Self {
        self.suffix = true;
        self
    }

    /// Page through matches.
    #[must_use]
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Per-call options for [`crate::Store::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub database: String,
    pub table: String,
    /// Overrides the record's own expiry when set.
    pub ttl: Option<Duration>,
}

impl WriteOptions {
    /// Write to a specific namespace.
    #[must_use]
    pub fn to_table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    /// Override the record's expiry.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Per-call options for [`crate::Store::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub database: String,
    pub table: String,
    /// Only keys starting with this string.
    pub prefix: Option<String>,
    /// Only keys ending with this string.
    pub suffix: Option<String>,
    /// Maximum number of keys returned; zero is unbounded.
    pub limit: usize,
    /// Number of live keys skipped, in descending key order.
    pub offset: usize,
}

impl ListOptions {
    /// List a specific namespace.
    #[must_use]
    pub fn from_table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    /// Only keys starting with `prefix`.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Only keys ending with `suffix`.
    #[must_use]
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Page through keys.
    #[must_use]
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Per-call options for [`crate::Store::delete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub database: String,
    pub table: String,
}

impl DeleteOptions {
    /// Delete from a specific namespace.
    #[must_use]
    pub fn from_table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = StoreOptions::default();
        assert!(options.database.is_empty());
        assert!(options.table.is_empty());
        assert!(options.dir.is_none());
        assert_eq!(options.busy_timeout(), Duration::from_secs(5));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let options = StoreOptions::from_toml(
            r#"
            database = "myapp"
            dir = "/tmp/kv"
            "#,
        )
        .unwrap();
        assert_eq!(options.database, "myapp");
        assert_eq!(options.table, "");
        assert_eq!(options.dir, Some(PathBuf::from("/tmp/kv")));
        assert_eq!(options.reaper_queue_capacity, DEFAULT_REAPER_QUEUE_CAPACITY);
    }

    #[test]
    fn test_from_toml_rejects_unknown_field() {
        let err = StoreOptions::from_toml("databse = \"typo\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_toml_rejects_zero_queue() {
        let err = StoreOptions::from_toml("reaper_queue_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("reaper_queue_capacity"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = StoreOptions::load_from("/nonexistent/kvlite.toml").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("kvlite.toml");
        fs::write(&path, "table = \"sessions\"\nbusy_timeout_ms = 250\n").unwrap();

        let options = StoreOptions::load_from(&path).unwrap();
        assert_eq!(options.table, "sessions");
        assert_eq!(options.busy_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_per_call_builders() {
        let read = ReadOptions::from_table("db", "t").prefix().page(10, 20);
        assert!(read.prefix && !read.suffix);
        assert_eq!((read.limit, read.offset), (10, 20));

        let write = WriteOptions::to_table("db", "t").ttl(Duration::from_secs(1));
        assert_eq!(write.ttl, Some(Duration::from_secs(1)));

        let list = ListOptions::default().prefix("user:").page(5, 0);
        assert_eq!(list.prefix.as_deref(), Some("user:"));
        assert_eq!(list.limit, 5);
    }
}
