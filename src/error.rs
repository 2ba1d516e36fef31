//! Error types for the storage engine.
//!
//! Every failure carries the namespace (and where relevant the operation or
//! key) it happened in. [`Error::NotFound`] is an expected outcome of point
//! reads rather than an engine failure; use [`Error::is_not_found`] to
//! implement cache-miss semantics.

use std::path::Path;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage engine errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Point read on an absent or expired key.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// A record was written without a key.
    #[error("record key must not be empty (namespace '{namespace}')")]
    EmptyKey { namespace: String },

    /// Opening or configuring a connection handle failed.
    #[error("failed to open database for '{namespace}': {source}")]
    Connection {
        namespace: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Table or index creation failed.
    #[error("failed to provision schema for '{namespace}': {source}")]
    Schema {
        namespace: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Metadata could not be serialized or deserialized.
    #[error("metadata codec error for key '{key}' in '{namespace}': {source}")]
    Codec {
        namespace: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A statement failed on an open handle.
    #[error("{operation} failed in '{namespace}': {source}")]
    Query {
        namespace: String,
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The handle was closed by a concurrent `close`/`init`.
    #[error("database handle for '{namespace}' is closed")]
    Closed { namespace: String },

    /// Lazy deletion of an expired key failed. Only ever logged.
    #[error("background deletion of '{key}' in '{namespace}' failed: {source}")]
    BackgroundDeletion {
        namespace: String,
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a connection error from any underlying failure.
    pub fn connection(
        namespace: impl ToString,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Connection {
            namespace: namespace.to_string(),
            source: source.into(),
        }
    }

    /// Create a schema provisioning error.
    pub fn schema(namespace: impl ToString, source: rusqlite::Error) -> Self {
        Self::Schema {
            namespace: namespace.to_string(),
            source,
        }
    }

    /// Create a metadata codec error.
    pub fn codec(
        namespace: impl ToString,
        key: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        Self::Codec {
            namespace: namespace.to_string(),
            key: key.into(),
            source,
        }
    }

    /// Create a query error for the named operation.
    pub fn query(
        namespace: impl ToString,
        operation: &'static str,
        source: rusqlite::Error,
    ) -> Self {
        Self::Query {
            namespace: namespace.to_string(),
            operation,
            source,
        }
    }

    /// Create a closed handle error.
    pub fn closed(namespace: impl ToString) -> Self {
        Self::Closed {
            namespace: namespace.to_string(),
        }
    }

    /// Wrap a failure hit while lazily deleting an expired key.
    pub fn background_deletion(
        namespace: impl ToString,
        key: impl Into<String>,
        source: Error,
    ) -> Self {
        Self::BackgroundDeletion {
            namespace: namespace.to_string(),
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an IO error about a specific path.
    pub(crate) fn io_path(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{action} {}", path.display()), source)
    }

    /// Returns true for [`Error::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        let err = Error::not_found("session:1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "key not found: session:1");

        let err = Error::closed("app:users");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_context_names_namespace() {
        let err = Error::query("app:users", "read", rusqlite::Error::InvalidQuery);
        let msg = err.to_string();
        assert!(msg.contains("read"));
        assert!(msg.contains("app:users"));
    }

    #[test]
    fn test_background_deletion_keeps_source() {
        let inner = Error::closed("app:users");
        let err = Error::background_deletion("app:users", "k", inner);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("database handle for 'app:users' is closed")
        );
    }
}
