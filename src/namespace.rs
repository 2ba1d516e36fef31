//! Namespace identifiers and their normalization.
//!
//! A namespace is the `(database, table)` pair that scopes a set of records.
//! Both halves end up inside SQL statements and file names, so they are
//! restricted to `[A-Za-z0-9_]` before use.

use std::fmt;

/// Database used when neither the call nor the configuration names one.
pub const DEFAULT_DATABASE: &str = "kvlite";

/// Table used when neither the call nor the configuration names one.
pub const DEFAULT_TABLE: &str = "kvlite";

/// Replace every run of characters outside `[A-Za-z0-9_]` with a single `_`.
///
/// Empty input yields empty output; callers substitute defaults.
///
/// ```
/// use kvlite::sanitize;
///
/// assert_eq!(sanitize("my-app.v2"), "my_app_v2");
/// assert_eq!(sanitize("a//b"), "a_b");
/// assert_eq!(sanitize("already_ok"), "already_ok");
/// ```
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    out
}

/// Pick the first non-empty identifier: per-call override, then configured
/// default, then the process-wide fallback.
pub fn resolve_identifier<'a>(call: &'a str, configured: &'a str, fallback: &'a str) -> &'a str {
    [call, configured]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or(fallback)
}

/// A sanitized `(database, table)` pair.
///
/// Construct through [`Namespace::new`] so that both halves are always safe
/// to interpolate into SQL and file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    database: String,
    table: String,
}

impl Namespace {
    /// Sanitize and pair a database and table identifier.
    ///
    /// Empty identifiers (before or after sanitizing) fall back to
    /// [`DEFAULT_DATABASE`] / [`DEFAULT_TABLE`].
    pub fn new(database: &str, table: &str) -> Self {
        Self {
            database: non_empty(sanitize(database), DEFAULT_DATABASE),
            table: non_empty(sanitize(table), DEFAULT_TABLE),
        }
    }

    /// Resolve per-call identifiers against the configured defaults.
    pub fn resolve(
        call_database: &str,
        call_table: &str,
        configured_database: &str,
        configured_table: &str,
    ) -> Self {
        Self::new(
            resolve_identifier(call_database, configured_database, DEFAULT_DATABASE),
            resolve_identifier(call_table, configured_table, DEFAULT_TABLE),
        )
    }

    /// Sanitized database identifier.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Sanitized table identifier.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Compound `database:table` key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.database, self.table)
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
