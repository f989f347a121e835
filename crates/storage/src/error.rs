//! Error types for listing, selecting and caching.

use rusty_s3access_query::QueryError;
use thiserror::Error;

/// Errors reported by a transport client.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object or bucket not found.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied.
    #[error("Access denied to s3://{bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Network or service error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error is retryable.
    ///
    /// Nothing in this crate retries; the flag is for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NetworkError { retryable, .. } => *retryable,
            StorageError::NotFound { .. } => false,
            StorageError::AccessDenied { .. } => false,
            StorageError::IoError { .. } => false,
            StorageError::InvalidConfig { .. } => false,
            StorageError::Other { .. } => false,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

/// Errors raised while decoding a select payload or a cache file.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The bytes do not have the expected format.
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The reader does not implement this operation.
    #[error("Unsupported reader operation: {0}")]
    Unsupported(&'static str),
}

impl From<csv::Error> for ReaderError {
    fn from(err: csv::Error) -> Self {
        ReaderError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for ReaderError {
    fn from(err: serde_json::Error) -> Self {
        ReaderError::Decode(err.to_string())
    }
}

/// Error surfaced by listing and select operations.
///
/// A fan-out stops at the first failing object and reports its error; results
/// of other objects are discarded.
#[derive(Error, Debug)]
pub enum SelectError {
    /// Bad address, filter or pattern.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Listing or select call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The event stream ended without an end event.
    #[error("Select stream for s3://{bucket}/{key} ended before its end event")]
    IncompleteStream { bucket: String, key: String },

    /// The payload could not be decoded.
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// A worker thread panicked.
    #[error("Select worker panicked")]
    WorkerPanicked,
}

/// Cache problems. These never fail a select; they are logged and the cache is
/// bypassed for the affected entry.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A cache file exists but could not be read.
    #[error("Corrupt cache file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: ReaderError,
    },

    /// A cache file or its directory could not be written.
    #[error("Cannot write cache file {path}: {message}")]
    Unwritable { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let err: StorageError = StorageError::NetworkError {
            message: "slow down".into(),
            retryable: true,
        };
        assert!(err.is_retryable());
        assert!(!StorageError::NotFound {
            bucket: "b".into(),
            key: "k".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_select_error_conversions() {
        let err: SelectError = QueryError::invalid_filter("bad").into();
        assert!(matches!(err, SelectError::Query(_)));

        let err: SelectError = StorageError::Other {
            message: "boom".into(),
        }
        .into();
        assert_eq!(err.to_string(), "boom");

        let err: SelectError = SelectError::IncompleteStream {
            bucket: "b".into(),
            key: "k".into(),
        };
        assert!(err.to_string().contains("s3://b/k"));
    }
}
