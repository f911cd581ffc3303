//! Shared type definitions for the ddfeed service.
//!
//! Everything that crosses a crate boundary lives here: the JSON shapes
//! returned to clients and the identifier types that the store, the cache
//! and the HTTP layer agree on.
//!
//! # Modules
//!
//! - [`ids`] -- External identifiers, internal keys and the identity scheme
//! - [`structs`] -- Posts, comments, pages and request bodies

pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::{ExternalId, IdentityScheme, InternalKey};
pub use structs::{Comment, NewComment, NewPost, Post, PostPage};
