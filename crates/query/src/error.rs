//! Error types for path parsing and filter construction.

use thiserror::Error;

/// Errors raised before any I/O happens: bad addresses, filters or patterns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The address does not match `[scheme://]bucket[/key]`.
    #[error("Malformed S3 address: {input:?}")]
    MalformedAddress {
        /// The rejected input.
        input: String,
    },

    /// A filter value or operator cannot be turned into a condition.
    #[error("Invalid filter value: {message}")]
    InvalidFilterValue {
        /// What was wrong with the filter.
        message: String,
    },

    /// A key pattern could not be compiled.
    #[error("Invalid glob pattern {pattern}: {reason}")]
    InvalidGlobPattern {
        /// The offending pattern.
        pattern: String,
        /// Reason reported by the matcher.
        reason: String,
    },
}

impl QueryError {
    /// Create an `InvalidFilterValue` error.
    ///
    /// # Arguments
    /// * `message` - Description of the problem
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilterValue {
            message: message.into(),
        }
    }
}
