//! Embedded namespaced key-value store with TTL, backed by SQLite.
//!
//! - [`Store`] - the public API (`init`, `close`, `list`, `read`, `write`, `delete`)
//! - [`Record`] - key, opaque value bytes, JSON metadata, relative expiry
//! - [`StoreOptions`] - store-wide configuration, loadable from TOML
//! - [`Namespace`] / [`sanitize`] - `(database, table)` addressing
//!
//! Each database identifier is one SQLite file under the store directory
//! (`~/.kvlite/` unless configured); all of its tables share one connection.

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod namespace;
pub mod paths;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DeleteOptions, ListOptions, ReadOptions, StoreOptions, WriteOptions};
pub use error::{Error, Result};
pub use namespace::{DEFAULT_DATABASE, DEFAULT_TABLE, Namespace, sanitize};
pub use store::{Handle, Metadata, Record, Registry, Store};
