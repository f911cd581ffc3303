//! Error taxonomy for the feed core.
//!
//! [`StoreError`] and [`CacheError`] describe failures of the two backing
//! services. [`FeedError`] is what callers of the coordinator see. There
//! is no conversion from [`CacheError`] into [`FeedError`]:
//! a cache failure can never become a request failure.

/// A relational store failure.
///
/// Absence of a row is not an error; lookups return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (pool exhausted, connection lost).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A constraint was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Any other query failure.
    #[error("query failed: {0}")]
    Query(String),
}

/// A key-value cache failure. Always equivalent to a miss for the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The cache could not be reached or the command timed out.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The stored value has the wrong shape (e.g. a non-integer counter).
    #[error("unexpected value at {key}: {message}")]
    UnexpectedValue {
        /// The key holding the bad value.
        key: String,
        /// What was wrong with it.
        message: String,
    },
}

/// The outcome of a failed feed operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The requested post does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store failed where no fallback was possible.
    #[error(transparent)]
    Store(#[from] StoreError),
}
