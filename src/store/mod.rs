//! Namespaced key-value store on SQLite.
//!
//! Records live in tables addressed by a `(database, table)` namespace. Each
//! database identifier maps to one SQLite file under the store directory and
//! one shared connection; each table identifier maps to a table in that file.
//!
//! Expiry is lazy: a record past its deadline is hidden from every read and
//! queued for background deletion when a read observes it.
//!
//! # Example
//!
//! ```no_run
//! use kvlite::{ReadOptions, Record, Store, StoreOptions, WriteOptions};
//! use std::time::Duration;
//!
//! let store = Store::open(StoreOptions::default().with_database("myapp"))?;
//!
//! let session = Record::new("session:123", "user_data")
//!     .with_metadata("user", "alice")
//!     .with_expiry(Duration::from_secs(3600));
//! store.write(&session, WriteOptions::default())?;
//!
//! let records = store.read("session:", ReadOptions::default().prefix())?;
//! assert_eq!(records.len(), 1);
//! # Ok::<(), kvlite::Error>(())
//! ```

mod codec;
mod query;
mod reaper;
mod registry;
mod types;


use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub use registry::{Handle, Registry};
pub use types::{Metadata, Record};

use crate::clock::{Clock, SystemClock};
use crate::config::{DeleteOptions, ListOptions, ReadOptions, StoreOptions, WriteOptions};
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::paths;
use query::{Executor, Match};
use reaper::Reaper;

/// Embedded key-value store.
///
/// # Thread Safety
///
/// `Store` is `Send + Sync`; share it behind an `Arc`. Calls on different
/// namespaces only contend briefly on the registry lock; calls on tables of
/// the same database serialize on that database's connection.
pub struct Store {
    options: RwLock<StoreOptions>,
    registry: Arc<Registry>,
    reaper: Reaper,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Opens a store and provisions its default namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, the reaper thread
    /// cannot be started, or the default namespace cannot be provisioned.
    pub fn open(options: StoreOptions) -> Result<Self> {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Opens a store that reads time from `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`Store::open`].
    pub fn with_clock(options: StoreOptions, clock: Arc<dyn Clock>) -> Result<Self> {
        options.validate()?;

        let dir = options.dir.clone().unwrap_or_else(paths::get_store_dir);
        let registry = Arc::new(Registry::new(dir, options.busy_timeout()));
        let reaper = Reaper::spawn(
            Arc::downgrade(&registry),
            Arc::clone(&clock),
            options.reaper_queue_capacity,
        )?;

        let store = Self {
            options: RwLock::new(options.clone()),
            registry,
            reaper,
            clock,
        };
        store.init(options)?;
        Ok(store)
    }

    /// Replaces the configuration.
    ///
    /// Closes every open handle, then opens and provisions the new default
    /// namespace. The reaper queue keeps the capacity it was opened with.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the default namespace
    /// cannot be provisioned. The new options stay in effect either way.
    pub fn init(&self, options: StoreOptions) -> Result<()> {
        options.validate()?;

        let dir = options.dir.clone().unwrap_or_else(paths::get_store_dir);
        self.registry.reset(dir, options.busy_timeout());
        *self.options.write() = options;

        let ns = self.namespace("", "");
        tracing::debug!(namespace = %ns, "Initializing store");
        self.registry.resolve(&ns).inspect_err(|e| {
            tracing::warn!(namespace = %ns, error = %e, "Failed to provision default namespace");
        })?;
        Ok(())
    }

    /// Closes every open handle. Safe to call repeatedly; later calls reopen
    /// namespaces on demand.
    pub fn close(&self) {
        self.registry.close_all();
    }

    /// Current configuration.
    pub fn options(&self) -> StoreOptions {
        self.options.read().clone()
    }

    /// The connection registry, for inspection.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lists live keys.
    ///
    /// With a prefix and/or suffix only matching keys are returned. With a
    /// `limit` or `offset` keys are ordered descending and paged; otherwise
    /// order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be provisioned or the query
    /// fails.
    pub fn list(&self, options: ListOptions) -> Result<Vec<String>> {
        let exec = self.executor(&options.database, &options.table)?;

        let paged = options.limit > 0 || options.offset > 0;
        let (pattern, mode) = match (options.prefix.as_deref(), options.suffix.as_deref()) {
            (None, None) if !paged => return exec.list(),
            (None, None) => ("", Match::default()),
            (Some(p), None) => (p, Match::PREFIX),
            (None, Some(s)) => (s, Match::SUFFIX),
            (Some(p), Some(s)) => {
                let keys = exec.read_many(p, Match::PREFIX)?.into_iter().map(|r| r.key);
                return Ok(starts_and_ends(keys, p, s, options.limit, options.offset));
            },
        };

        let records = if paged {
            exec.read_many_paged(pattern, mode, options.limit, options.offset)?
        } else {
            exec.read_many(pattern, mode)?
        };
        Ok(records.into_iter().map(|r| r.key).collect())
    }

    /// Reads records.
    ///
    /// Without `prefix`/`suffix` this is an exact lookup returning one record
    /// or [`Error::NotFound`]. With either it is a pattern scan that returns
    /// zero or more records, paged when `limit` or `offset` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an absent or expired exact key, or an
    /// error if the namespace cannot be provisioned, the query fails, or
    /// stored metadata is malformed.
    pub fn read(&self, key: &str, options: ReadOptions) -> Result<Vec<Record>> {
        let exec = self.executor(&options.database, &options.table)?;

        if !options.prefix && !options.suffix {
            return exec.read(key).map(|record| vec![record]);
        }

        let mode = Match {
            prefix: options.prefix,
            suffix: options.suffix,
        };
        if options.limit == 0 && options.offset == 0 {
            exec.read_many(key, mode)
        } else {
            exec.read_many_paged(key, mode, options.limit, options.offset)
        }
    }

    /// Inserts or fully replaces a record.
    ///
    /// `options.ttl`, when set, takes precedence over `record.expiry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, the namespace cannot be
    /// provisioned, or the write fails.
    pub fn write(&self, record: &Record, options: WriteOptions) -> Result<()> {
        let exec = self.executor(&options.database, &options.table)?;
        if record.key.is_empty() {
            return Err(Error::EmptyKey {
                namespace: exec.ns.to_string(),
            });
        }

        match options.ttl {
            Some(ttl) => exec.write(&Record {
                expiry: Some(ttl),
                ..record.clone()
            }),
            None => exec.write(record),
        }
    }

    /// Deletes a key. Returns whether a record was removed; an absent key is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be provisioned or the delete
    /// fails.
    pub fn delete(&self, key: &str, options: DeleteOptions) -> Result<bool> {
        self.executor(&options.database, &options.table)?.delete(key)
    }

    fn namespace(&self, database: &str, table: &str) -> Namespace {
        let options = self.options.read();
        Namespace::resolve(database, table, &options.database, &options.table)
    }

    fn executor(&self, database: &str, table: &str) -> Result<Executor<'_>> {
        let ns = self.namespace(database, table);
        let handle = self.registry.resolve(&ns)?;
        Ok(Executor {
            handle,
            ns,
            reaper: &self.reaper,
            // Deadlines are stored in whole milliseconds; judge at the same precision
            now: codec::truncate_millis(self.clock.now()),
        })
    }
}

/// Keeps keys (already known to start with `prefix`) that also end with
/// `suffix` without the two overlapping, paged in descending order when
/// `limit` or `offset` is set.
fn starts_and_ends(
    keys: impl Iterator<Item = String>,
    prefix: &str,
    suffix: &str,
    limit: usize,
    offset: usize,
) -> Vec<String> {
    let mut keys: Vec<String> = keys
        .filter(|k| k.len() >= prefix.len() + suffix.len() && k.ends_with(suffix))
        .collect();

    if limit == 0 && offset == 0 {
        return keys;
    }
    keys.sort_unstable_by(|a, b| b.cmp(a));
    let page = keys.into_iter().skip(offset);
    if limit == 0 {
        page.collect()
    } else {
        page.take(limit).collect()
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sqlite")
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("options", &*self.options.read())
            .field("namespaces", &self.registry.namespaces())
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.registry.close_all();
    }
}
