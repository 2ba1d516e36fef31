//! Statement execution against a provisioned table.
//!
//! Every read judges expiry against a single `now` taken at the start of the
//! call. Expired rows are left in place and handed to the [`Reaper`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;

use super::codec;
use super::reaper::Reaper;
use super::registry::Handle;
use super::types::{Decoded, Record, Row};
use crate::error::{Error, Result};
use crate::namespace::Namespace;

/// The canonical statements, templated on a sanitized table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    List,
    Read,
    ReadMany,
    ReadOffset,
    ExpiredMatching,
    Write,
    Delete,
    DeleteExpired,
}

impl Statement {
    fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Read => "read",
            Self::ReadMany => "read many",
            Self::ReadOffset => "read page",
            Self::ExpiredMatching => "scan expired",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::DeleteExpired => "delete expired",
        }
    }

    fn sql(self, table: &str) -> String {
        match self {
            Self::List => format!(r#"SELECT key, value, metadata, expiry FROM "{table}""#),
            Self::Read => {
                format!(r#"SELECT key, value, metadata, expiry FROM "{table}" WHERE key = ?1"#)
            },
            Self::ReadMany => {
                format!(r#"SELECT key, value, metadata, expiry FROM "{table}" WHERE key GLOB ?1"#)
            },
            Self::ReadOffset => format!(
                r#"SELECT key, value, metadata, expiry FROM "{table}"
                   WHERE key GLOB ?1 AND (expiry IS NULL OR expiry >= ?2)
                   ORDER BY key DESC LIMIT ?3 OFFSET ?4"#
            ),
            Self::ExpiredMatching => format!(
                r#"SELECT key FROM "{table}"
                   WHERE key GLOB ?1 AND expiry IS NOT NULL AND expiry < ?2"#
            ),
            Self::Write => format!(
                r#"INSERT INTO "{table}" (key, value, metadata, expiry) VALUES (?1, ?2, ?3, ?4)
                   ON CONFLICT (key) DO UPDATE SET
                       value = excluded.value,
                       metadata = excluded.metadata,
                       expiry = excluded.expiry"#
            ),
            Self::Delete => format!(r#"DELETE FROM "{table}" WHERE key = ?1"#),
            Self::DeleteExpired => format!(
                r#"DELETE FROM "{table}"
                   WHERE key = ?1 AND expiry IS NOT NULL AND expiry < ?2"#
            ),
        }
    }
}

/// How a pattern scan matches keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Match {
    /// Keys starting with the pattern.
    pub prefix: bool,
    /// Keys ending with the pattern.
    pub suffix: bool,
}

impl Match {
    /// Keys starting with the pattern.
    pub(crate) const PREFIX: Self = Self {
        prefix: true,
        suffix: false,
    };

    /// Keys ending with the pattern.
    pub(crate) const SUFFIX: Self = Self {
        prefix: false,
        suffix: true,
    };

    /// Builds the GLOB pattern for `key`. Prefix and suffix together match
    /// keys containing `key`; neither matches every key.
    pub(crate) fn glob(self, key: &str) -> String {
        let escaped = escape_glob(key);
        match (self.prefix, self.suffix) {
            (true, true) => format!("*{escaped}*"),
            (true, false) => format!("{escaped}*"),
            (false, true) => format!("*{escaped}"),
            (false, false) if key.is_empty() => "*".to_string(),
            (false, false) => escaped,
        }
    }
}

/// Escape GLOB metacharacters so `key` matches literally.
fn escape_glob(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '*' | '?' | '[' => {
                out.push('[');
                out.push(c);
                out.push(']');
            },
            _ => out.push(c),
        }
    }
    out
}

/// One operation's view of a namespace: its handle, the reaper for expired
/// keys, and the instant expiry is judged against.
pub(crate) struct Executor<'a> {
    pub handle: Arc<Handle>,
    pub ns: Namespace,
    pub reaper: &'a Reaper,
    pub now: DateTime<Utc>,
}

impl Executor<'_> {
    /// All live keys. Order is unspecified.
    pub fn list(&self) -> Result<Vec<String>> {
        let rows = self.query_rows(Statement::List, ())?;
        Ok(self.live(rows)?.into_iter().map(|r| r.key).collect())
    }

    /// Exact-match read. Absent and expired keys are [`Error::NotFound`].
    pub fn read(&self, key: &str) -> Result<Record> {
        let row = self.with_conn(Statement::Read, |conn, sql| {
            conn.prepare_cached(sql)?
                .query_row(params![key], map_row)
                .optional()
        })?;

        let row = row.ok_or_else(|| Error::not_found(key))?;
        match codec::decode(&self.ns, row, self.now)? {
            Decoded::Live(record) => Ok(record),
            Decoded::Expired(key) => {
                self.reaper.schedule(&self.ns, key.clone());
                Err(Error::not_found(key))
            },
        }
    }

    /// Pattern scan without bounds. No matches is an empty vec.
    pub fn read_many(&self, key: &str, mode: Match) -> Result<Vec<Record>> {
        let pattern = mode.glob(key);
        let rows = self.query_rows(Statement::ReadMany, params![pattern])?;
        self.live(rows)
    }

    /// Pattern scan ordered by key descending, skipping `offset` live rows
    /// and returning at most `limit` (zero is unbounded).
    ///
    /// Expiry is filtered in SQL so expired rows never take a slot; the
    /// expired matches are fetched separately and queued for deletion.
    pub fn read_many_paged(
        &self,
        key: &str,
        mode: Match,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>> {
        let pattern = mode.glob(key);
        let now = self.now.timestamp_millis();
        let limit = if limit == 0 {
            -1
        } else {
            i64::try_from(limit).unwrap_or(i64::MAX)
        };
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows = self.query_rows(
            Statement::ReadOffset,
            params![pattern, now, limit, offset],
        )?;
        let records = self.live(rows)?;

        let expired: Vec<String> = self.with_conn(Statement::ExpiredMatching, |conn, sql| {
            conn.prepare_cached(sql)?
                .query_map(params![pattern, now], |row| row.get(0))?
                .collect()
        })?;
        for key in expired {
            self.reaper.schedule(&self.ns, key);
        }

        Ok(records)
    }

    /// Insert or fully replace `record`.
    pub fn write(&self, record: &Record) -> Result<()> {
        let row = codec::encode(&self.ns, record, self.now)?;
        let expiry = row.expiry.map(|at| at.timestamp_millis());

        self.with_conn(Statement::Write, |conn, sql| {
            conn.prepare_cached(sql)?
                .execute(params![row.key, row.value, row.metadata, expiry])
        })?;
        Ok(())
    }

    /// Remove `key`. Returns whether a row was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        delete(&self.handle, &self.ns, key)
    }

    fn with_conn<T>(
        &self,
        stmt: Statement,
        f: impl FnOnce(&Connection, &str) -> rusqlite::Result<T>,
    ) -> Result<T> {
        run(&self.handle, &self.ns, stmt, f)
    }

    fn query_rows(&self, stmt: Statement, params: impl rusqlite::Params) -> Result<Vec<Row>> {
        self.with_conn(stmt, |conn, sql| {
            conn.prepare_cached(sql)?
                .query_map(params, map_row)?
                .collect()
        })
    }

    /// Decode rows, queueing the expired ones and returning the rest.
    fn live(&self, rows: Vec<Row>) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match codec::decode(&self.ns, row, self.now)? {
                Decoded::Live(record) => records.push(record),
                Decoded::Expired(key) => self.reaper.schedule(&self.ns, key),
            }
        }
        Ok(records)
    }
}

/// Remove `key` from the namespace's table.
pub(crate) fn delete(handle: &Handle, ns: &Namespace, key: &str) -> Result<bool> {
    let removed = run(handle, ns, Statement::Delete, |conn, sql| {
        conn.prepare_cached(sql)?.execute(params![key])
    })?;
    Ok(removed > 0)
}

/// Remove `key` only if it is still expired at `now`.
///
/// A key re-written after the expiry was observed survives.
pub(crate) fn delete_expired(
    handle: &Handle,
    ns: &Namespace,
    key: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let removed = run(handle, ns, Statement::DeleteExpired, |conn, sql| {
        conn.prepare_cached(sql)?
            .execute(params![key, now.timestamp_millis()])
    })?;
    Ok(removed > 0)
}

fn run<T>(
    handle: &Handle,
    ns: &Namespace,
    stmt: Statement,
    f: impl FnOnce(&Connection, &str) -> rusqlite::Result<T>,
) -> Result<T> {
    let sql = stmt.sql(ns.table());
    handle.with_conn(ns, |conn| {
        f(conn, &sql).map_err(|e| Error::query(ns, stmt.name(), e))
    })
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let value: Option<Vec<u8>> = row.get(1)?;
    let expiry: Option<i64> = row.get(3)?;
    Ok(Row {
        key: row.get(0)?,
        value: value.unwrap_or_default(),
        metadata: row.get(2)?,
        expiry: expiry.map(codec::from_millis),
    })
}
