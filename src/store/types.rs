//! Record and row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Open-ended record metadata.
///
/// Values keep their JSON type (string, number, bool, null, array, object)
/// through a write/read cycle.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The unit of storage.
///
/// `expiry` is relative: on write it is the time-to-live from now (`None`
/// or zero never expires); on read it is the remaining time-to-live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    #[serde(with = "value_bytes")]
    pub value: Vec<u8>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Duration>,
}

impl Record {
    /// Creates a record that never expires.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Sets the time-to-live.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Persisted form of a record.
///
/// `expiry` is an absolute deadline; `None` never expires.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    pub key: String,
    pub value: Vec<u8>,
    pub metadata: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// Outcome of decoding a row at a given instant.
#[derive(Debug)]
pub(crate) enum Decoded {
    Live(Record),
    Expired(String),
}

/// Serializes record values as UTF-8 text when possible, else as a byte array.
mod value_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(value) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.collect_seq(value),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.into_bytes(),
            Repr::Bytes(bytes) => bytes,
        })
    }
}
