//! The relational store capability.
//!
//! [`EntityStore`] is the authoritative source for post and comment
//! existence, content and linkage. It never consults the cache. Every call
//! is a single attempt: failures surface immediately as [`StoreError`].

use async_trait::async_trait;
use ddfeed_types::{Comment, ExternalId, IdentityScheme, InternalKey};

use crate::error::StoreError;

/// A post row as the store holds it, including its internal key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    /// Internal (ordering) key.
    pub key: InternalKey,
    /// External identifier.
    pub id: ExternalId,
    /// Body text.
    pub body: String,
}

/// Where a listing page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Posts strictly older than this internal key.
    Key(InternalKey),
    /// Posts strictly older than the post with this external identifier,
    /// resolved by the store in the same query. An unknown identifier
    /// yields an empty page.
    External(ExternalId),
}

/// Relational operations backing the feed.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// The scheme this store assigns external identifiers with.
    fn identity_scheme(&self) -> IdentityScheme;

    /// Insert a post, assigning its internal key and external identifier
    /// in the same statement.
    async fn insert_post(&self, body: &str) -> Result<PostRecord, StoreError>;

    /// Return at most `limit` posts ordered by internal key, newest first,
    /// starting strictly after `before` when given.
    async fn list_posts(
        &self,
        limit: u32,
        before: Option<&PageCursor>,
    ) -> Result<Vec<PostRecord>, StoreError>;

    /// Look up one post by external identifier.
    async fn get_post(&self, id: &ExternalId) -> Result<Option<PostRecord>, StoreError>;

    /// Delete one post, returning the number of rows removed. Comments are
    /// left in place.
    async fn delete_post(&self, id: &ExternalId) -> Result<u64, StoreError>;

    /// Count all posts.
    async fn count_posts(&self) -> Result<i64, StoreError>;

    /// Count the comments on one post.
    async fn count_comments(&self, post_id: &ExternalId) -> Result<i64, StoreError>;

    /// Insert a comment under an already resolved post key.
    async fn insert_comment(
        &self,
        body: &str,
        post_key: InternalKey,
    ) -> Result<ExternalId, StoreError>;

    /// List the comments on one post in insertion order.
    async fn list_comments(&self, post_id: &ExternalId) -> Result<Vec<Comment>, StoreError>;

    /// Resolve an external identifier to its internal key.
    async fn resolve_internal_key(
        &self,
        id: &ExternalId,
    ) -> Result<Option<InternalKey>, StoreError>;

    /// Verify the store is reachable and its schema is usable.
    async fn health_check(&self) -> Result<(), StoreError>;
}
