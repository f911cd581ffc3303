//! Error types for the data layer.
//!
//! [`DbError`] covers setup (connecting, migrating, parsing URLs). Once the
//! adapters are running, their failures are reported in the core taxonomy
//! through [`store_error`] and [`cache_error`].

use ddfeed_core::{CacheError, StoreError};
use fred::error::ErrorKind;

/// Errors that can occur while setting up the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `Valkey`/Redis operation failed.
    #[error("Valkey error: {0}")]
    Valkey(#[from] fred::error::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Classify a [`sqlx::Error`] for the coordinator.
///
/// Pool exhaustion and transport failures are `Unavailable`, constraint
/// violations reported by the database are `Constraint`, and everything
/// else is `Query`.
pub fn store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(error.to_string()),
        sqlx::Error::Database(db)
            if !matches!(db.kind(), sqlx::error::ErrorKind::Other) =>
        {
            StoreError::Constraint(error.to_string())
        }
        _ => StoreError::Query(error.to_string()),
    }
}

/// Classify a [`fred::error::Error`] raised while operating on `key`.
///
/// Only a reply that could not be converted says anything about the
/// stored value; every other failure means the cache is out of reach.
pub fn cache_error(key: &str, error: &fred::error::Error) -> CacheError {
    match error.kind() {
        ErrorKind::Parse => CacheError::UnexpectedValue {
            key: key.to_owned(),
            message: error.to_string(),
        },
        _ => CacheError::Unavailable(error.to_string()),
    }
}
