//! Data layer for the ddfeed service (`Valkey` + `PostgreSQL`).
//!
//! `PostgreSQL` is the system of record for posts and comments. `Valkey`
//! holds the disposable projections the coordinator reads first. This
//! crate provides the concrete adapters behind the two capability traits
//! of `ddfeed-core`.
//!
//! # Architecture
//!
//! ```text
//! FeedCoordinator
//!     |
//!     +-- EntityStore ----> PostgreSQL (PostStore over PostgresPool)
//!     |
//!     +-- KeyValueStore --> Valkey (ValkeyPool)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool, configuration and migrations
//! - [`post_store`] -- Post and comment queries, readiness schema check
//! - [`valkey`] -- `Valkey` (Redis-compatible) key-value commands
//! - [`error`] -- Shared error types and mappings into the core taxonomy

pub mod error;
pub mod post_store;
pub mod postgres;
pub mod valkey;

// Re-export primary types for convenience.
pub use error::DbError;
pub use post_store::PostStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use valkey::{ValkeyConfig, ValkeyPool};
