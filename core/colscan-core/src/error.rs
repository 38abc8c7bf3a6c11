//! Error types for the columnar scan operator.
//!
//! All public APIs return `ColScanResult<T>` — no panics in library code.

use thiserror::Error;

/// Unified error type for all scan operations.
#[derive(Debug, Error)]
pub enum ColScanError {
    /// Construction-time configuration error (node identity, index ordinal, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// Assertion-class failure: a capability this path does not support
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// A deferred column type could not be resolved
    #[error("failed to hydrate type '{type_name}': {reason}")]
    TypeHydration { type_name: String, reason: String },

    /// Internal contract violation — fatal to the enclosing execution
    #[error("internal error: {0}")]
    Internal(String),

    /// Key-value read or decode fault surfaced by the fetcher
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The execution context was cancelled
    #[error("query execution cancelled")]
    Cancelled,

    /// Apache Arrow error (RecordBatch operations)
    #[error("arrow error: {source}")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ColScanError {
    /// Wraps any error as an internal contract violation.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        ColScanError::Internal(err.to_string())
    }

    /// Whether the error must abort the enclosing execution.
    ///
    /// Configuration errors are returned to the caller before an operator exists,
    /// so they are not fatal to any running flow.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ColScanError::Internal(_)
                | ColScanError::Fetch(_)
                | ColScanError::Arrow { .. }
                | ColScanError::Io { .. }
        )
    }
}

/// Result type alias for all scan operations.
pub type ColScanResult<T> = Result<T, ColScanError>;

impl From<serde_json::Error> for ColScanError {
    fn from(err: serde_json::Error) -> Self {
        ColScanError::Serialization(err.to_string())
    }
}
