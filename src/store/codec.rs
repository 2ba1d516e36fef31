//! Conversion between [`Record`] and its persisted [`Row`].

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::types::{Decoded, Metadata, Record, Row};
use crate::error::{Error, Result};
use crate::namespace::Namespace;

/// Build the row persisted for `record`, fixing its deadline relative to `now`.
///
/// A zero or absent expiry is stored as `None` (never expires), not as `now`.
pub(crate) fn encode(ns: &Namespace, record: &Record, now: DateTime<Utc>) -> Result<Row> {
    let metadata = serde_json::to_string(&record.metadata)
        .map_err(|e| Error::codec(ns, &record.key, e))?;

    Ok(Row {
        key: record.key.clone(),
        value: record.value.clone(),
        metadata: Some(metadata),
        expiry: deadline(record.expiry, now),
    })
}

/// Absolute deadline for a relative expiry.
pub(crate) fn deadline(expiry: Option<Duration>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let ttl = expiry.filter(|d| !d.is_zero())?;
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    Some(now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC))
}

/// Decode a row as observed at `now`.
///
/// Rows whose deadline is strictly before `now` come back as
/// [`Decoded::Expired`]; live rows carry their remaining time-to-live.
/// Malformed metadata is an error, never an empty map.
pub(crate) fn decode(ns: &Namespace, row: Row, now: DateTime<Utc>) -> Result<Decoded> {
    let metadata = match row.metadata.as_deref() {
        Some(text) => {
            serde_json::from_str::<Metadata>(text).map_err(|e| Error::codec(ns, &row.key, e))?
        },
        None => Metadata::new(),
    };

    let expiry = match row.expiry {
        Some(at) if at < now => return Ok(Decoded::Expired(row.key)),
        Some(at) => Some((at - now).to_std().unwrap_or(Duration::ZERO)),
        None => None,
    };

    Ok(Decoded::Live(Record {
        key: row.key,
        value: row.value,
        metadata,
        expiry,
    }))
}

/// Convert a stored millisecond timestamp back into a deadline.
pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(if ms < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Drop sub-millisecond precision, matching what is persisted.
pub(crate) fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(at.timestamp_millis())
}
