//! Storage error types.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by backends and backend streams.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A slice range was out of bounds or inverted.
    #[error("{op}: invalid range [{from}, {to}) for length {len}")]
    Range {
        /// Operation that rejected the range.
        op: &'static str,
        /// Requested (possibly relative) start.
        from: i64,
        /// Requested (possibly relative) end.
        to: i64,
        /// Stream length the range was resolved against.
        len: u64,
    },

    /// A byte-oriented backend received a non-byte event.
    #[error("{op}: expected a byte event, got {got}")]
    ExpectedBytes {
        /// Operation that rejected the event.
        op: &'static str,
        /// Kind of the offending event.
        got: &'static str,
    },

    /// An I/O operation failed.
    #[error("i/o error during {op} on {path}: {source}")]
    Io {
        /// Operation during which the failure occurred.
        op: &'static str,
        /// Path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The embedded key-value store failed.
    #[error("kv error: {0}")]
    KeyValue(String),

    /// The remote instance reported or caused a failure.
    #[error("remote error: {0}")]
    Remote(String),

    /// A config descriptor could not be used to build a backend.
    #[error("bad backend config: {0}")]
    Config(String),

    /// No creator registered for a descriptor type.
    #[error("no backend type \"{0}\"")]
    UnknownType(String),
}

impl StorageError {
    /// Shorthand for an [`StorageError::Io`] failure.
    pub fn io(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { op, path: path.into(), source }
    }
}

impl From<StorageError> for freshet_core::Error {
    fn from(err: StorageError) -> Self {
        freshet_core::Error::Source(err.to_string())
    }
}

impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        Self::KeyValue(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::KeyValue(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        Self::KeyValue(err.to_string())
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        Self::KeyValue(err.to_string())
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        Self::KeyValue(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        Self::KeyValue(err.to_string())
    }
}
