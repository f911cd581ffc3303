//! Feed HTTP API for the ddfeed service.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Feed endpoints** under `/ui/v1/posts` for creating, listing,
//!   reading and deleting posts and for commenting on them
//! - **Probes** under `/api/v1` for liveness and readiness
//!
//! Handlers are thin: they decode the request, call the shared
//! [`FeedCoordinator`](ddfeed_core::FeedCoordinator) and map its result
//! to a status code through [`ApiError`].

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
