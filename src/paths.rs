//! Path utilities for on-disk storage.
//!
//! - [`get_store_dir`] - `~/.kvlite/` (base directory for database files)
//! - [`database_path`] - `<dir>/<database>.db`
//! - [`ensure_dir`] - creates the base directory with owner-only permissions

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the base directory.
pub const HOME_ENV: &str = "KVLITE_HOME";

/// Get the kvlite base directory.
///
/// Resolution order:
/// 1. `KVLITE_HOME` environment variable (if set)
/// 2. `~/.kvlite/`
/// 3. `<tmp>/.kvlite/` when no home directory is known
pub fn get_store_dir() -> PathBuf {
    if let Ok(home) = std::env::var(HOME_ENV)
        && !home.is_empty()
    {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".kvlite")
}

/// Get the file backing a sanitized database identifier: `<dir>/<database>.db`
pub fn database_path(dir: &Path, database: &str) -> PathBuf {
    dir.join(format!("{database}.db"))
}

/// Create `dir` (and parents) if missing, owner-only on Unix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder
        .create(dir)
        .map_err(|e| Error::io_path("creating store directory", dir, e))
}
