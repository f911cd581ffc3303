//! Cache-aside core of the ddfeed service.
//!
//! The relational store is the system of record for posts and comments.
//! The key-value cache holds disposable projections of it: bodies,
//! identifier mappings and counters. [`FeedCoordinator`] decides, field by
//! field, when to trust the cache, when to fall back to the store, and how
//! to keep the projections loosely in step with the store.
//!
//! # Architecture
//!
//! ```text
//! HTTP handler
//!     |
//!     +-- FeedCoordinator
//!         |-- EntityStore     (authoritative, failures are fatal on writes)
//!         +-- KeyValueStore   (advisory, failures are logged and skipped)
//! ```
//!
//! # Modules
//!
//! - [`coordinator`] -- The per-operation cache-aside policy
//! - [`store`] -- The relational store capability
//! - [`kv`] -- The key-value capability and the [`Counter`] handle
//! - [`keys`] -- Cache key layout
//! - [`limit`] -- Page size clamping
//! - [`memory`] -- In-memory implementations of both capabilities
//! - [`error`] -- Error taxonomy

pub mod coordinator;
pub mod error;
pub mod keys;
pub mod kv;
pub mod limit;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use coordinator::FeedCoordinator;
pub use error::{CacheError, FeedError, StoreError};
pub use kv::{Counter, KeyValueStore};
pub use limit::PageLimit;
pub use memory::{MemoryCache, MemoryStore};
pub use store::{EntityStore, PageCursor, PostRecord};
