//! Error types for log store operations.

use thiserror::Error;

/// Errors that can occur during log store operations.
///
/// Each variant corresponds to one failing public operation; the payload is
/// the underlying engine's message. Nothing is retried or swallowed
/// internally, every failure propagates to the caller of the operation
/// that failed.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// The underlying database could not be opened or prepared.
    #[error("cannot open log store: {0}")]
    Open(String),

    /// A batch write failed; the whole batch was rolled back and the
    /// store's visible state is unchanged.
    #[error("log batch insert failed: {0}")]
    Insert(String),

    /// A filter query failed or a stored row could not be decoded; no
    /// partial results are returned.
    #[error("log query failed: {0}")]
    Query(String),
}

/// Result type for log store operations.
pub type LogStoreResult<T> = Result<T, LogStoreError>;
