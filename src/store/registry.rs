//! Connection registry.
//!
//! Maps each [`Namespace`] to the connection handle of its database file.
//! All tables under one database identifier share a single [`Handle`]; the
//! map is keyed by the full namespace only so lookups need no extra step.
//!
//! # Locking
//!
//! The map sits behind one `RwLock`. Resolving an already-registered
//! namespace takes the read lock. First use of a namespace takes the write
//! lock for the whole provisioning step (open or reuse the handle, create the
//! table, insert), which is what keeps two racing first-accesses from opening
//! two handles for one database.

use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::paths;

/// One open connection to a database file.
///
/// The connection is taken out on [`Handle::close`]; later use reports
/// [`Error::Closed`].
#[derive(Debug)]
pub struct Handle {
    database: String,
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl Handle {
    /// Opens (creating if needed) the file for `ns.database()` under `dir`.
    fn open(ns: &Namespace, dir: &Path, busy_timeout: Duration) -> Result<Self> {
        paths::ensure_dir(dir).map_err(|e| Error::connection(ns, e))?;

        let path = paths::database_path(dir, ns.database());
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn =
            Connection::open_with_flags(&path, flags).map_err(|e| Error::connection(ns, e))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| Error::connection(ns, e))?;

        tracing::debug!(
            database = %ns.database(),
            path = %path.display(),
            "Opened database handle"
        );

        Ok(Self {
            database: ns.database().to_string(),
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Sanitized database identifier this handle serves.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once [`Handle::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }

    /// Runs `f` with exclusive use of the connection.
    pub(crate) fn with_conn<T>(
        &self,
        ns: &Namespace,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(|| Error::closed(ns))?;
        f(conn)
    }

    /// Closes the connection. Safe to call repeatedly.
    fn close(&self) {
        let Some(conn) = self.conn.lock().take() else {
            return;
        };
        if let Err((_, e)) = conn.close() {
            tracing::warn!(
                database = %self.database,
                error = %e,
                "Failed to close database handle cleanly"
            );
        }
    }

    /// Creates the namespace's table and key index if they do not exist.
    fn provision(&self, ns: &Namespace) -> Result<()> {
        let table = ns.table();
        let ddl = format!(
            r#"CREATE TABLE IF NOT EXISTS "{table}" (
                key TEXT NOT NULL,
                value BLOB,
                metadata TEXT,
                expiry TIMESTAMP,
                CONSTRAINT "{table}_pkey" PRIMARY KEY (key)
            );
            CREATE INDEX IF NOT EXISTS "key_index_{table}" ON "{table}" (key);"#
        );

        self.with_conn(ns, |conn| {
            conn.execute_batch(&ddl).map_err(|e| Error::schema(ns, e))
        })
    }
}

/// Registry of open handles, keyed by namespace.
#[derive(Debug)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    busy_timeout: Duration,
    handles: HashMap<Namespace, Arc<Handle>>,
}

impl Inner {
    fn close_all(&mut self) {
        for (ns, handle) in self.handles.drain() {
            tracing::debug!(namespace = %ns, "Closing namespace");
            handle.close();
        }
    }
}

impl Registry {
    /// Creates an empty registry storing database files under `dir`.
    pub fn new(dir: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                dir: dir.into(),
                busy_timeout,
                handles: HashMap::new(),
            }),
        }
    }

    /// Base directory for database files.
    pub fn dir(&self) -> PathBuf {
        self.inner.read().dir.clone()
    }

    /// Returns the handle for `ns`, provisioning it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if a new handle cannot be opened and
    /// [`Error::Schema`] if the table or index cannot be created.
    pub fn resolve(&self, ns: &Namespace) -> Result<Arc<Handle>> {
        if let Some(handle) = self.inner.read().handles.get(ns) {
            return Ok(Arc::clone(handle));
        }

        let mut inner = self.inner.write();

        // Another caller may have provisioned it while we waited for the lock.
        if let Some(handle) = inner.handles.get(ns) {
            return Ok(Arc::clone(handle));
        }

        let existing = inner
            .handles
            .iter()
            .find(|(k, _)| k.database() == ns.database())
            .map(|(_, h)| Arc::clone(h));

        let (handle, fresh) = match existing {
            Some(handle) => (handle, false),
            None => {
                let handle = Handle::open(ns, &inner.dir, inner.busy_timeout)?;
                (Arc::new(handle), true)
            },
        };

        if let Err(e) = handle.provision(ns) {
            tracing::warn!(namespace = %ns, error = %e, "Failed to provision table");
            if fresh {
                handle.close();
            }
            return Err(e);
        }

        tracing::debug!(namespace = %ns, reused = !fresh, "Registered namespace");
        inner.handles.insert(ns.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Returns the handle for `ns` if it is registered, without provisioning.
    pub fn get(&self, ns: &Namespace) -> Option<Arc<Handle>> {
        self.inner.read().handles.get(ns).cloned()
    }

    /// Closes and forgets every handle. Idempotent.
    pub fn close_all(&self) {
        self.inner.write().close_all();
    }

    /// Closes every handle and switches to a new directory and busy timeout.
    pub fn reset(&self, dir: impl Into<PathBuf>, busy_timeout: Duration) {
        let mut inner = self.inner.write();
        inner.close_all();
        inner.dir = dir.into();
        inner.busy_timeout = busy_timeout;
    }

    /// Number of registered namespaces.
    pub fn len(&self) -> usize {
        self.inner.read().handles.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().handles.is_empty()
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces: Vec<_> = self.inner.read().handles.keys().cloned().collect();
        namespaces.sort();
        namespaces
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.inner.get_mut().close_all();
    }
}
