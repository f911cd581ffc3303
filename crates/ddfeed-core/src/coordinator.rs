//! The cache-aside coordinator.
//!
//! Every public feed operation runs through [`FeedCoordinator`]. Writes go
//! to the store first and are authoritative; the cache is populated,
//! adjusted or cleaned up afterwards on a best-effort basis. Reads prefer
//! the cache field by field and fall back to the store on any miss or
//! cache error, so one response may be assembled from both.
//!
//! Cached values are never time-expired. They leave the cache only when a
//! post is deleted, and they are corrected only by being overwritten.
//!
//! # Counter policy
//!
//! Counters are adjusted with get-then-adjust-or-recount: a Present counter
//! gets the atomic `incr`/`decr`, an Absent one is recounted from the store
//! (the write has already committed) and overwritten. No increment is ever
//! applied to a missing base. The read-then-adjust pair is not atomic, and
//! neither is the comment read plus counter overwrite in
//! [`FeedCoordinator::get_post`], so concurrent writers can leave a counter
//! briefly off until the next single-post read repairs it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ddfeed_types::{Comment, ExternalId, IdentityScheme, InternalKey, Post, PostPage};

use crate::error::{CacheError, FeedError, StoreError};
use crate::keys;
use crate::kv::{Counter, KeyValueStore, parse_count};
use crate::limit::PageLimit;
use crate::store::{EntityStore, PageCursor, PostRecord};

/// Direction of a counter adjustment.
#[derive(Debug, Clone, Copy)]
enum Step {
    Up,
    Down,
}

/// Applies the cache-aside policy for posts and comments.
///
/// Holds no per-request state; a single instance is shared by all
/// requests.
pub struct FeedCoordinator {
    store: Arc<dyn EntityStore>,
    cache: Arc<dyn KeyValueStore>,
    scheme: IdentityScheme,
    cache_faults: AtomicU64,
}

impl FeedCoordinator {
    /// Create a coordinator over a store and a cache.
    ///
    /// Identifiers are validated against the store's identity scheme.
    pub fn new(store: Arc<dyn EntityStore>, cache: Arc<dyn KeyValueStore>) -> Self {
        let scheme = store.identity_scheme();
        Self {
            store,
            cache,
            scheme,
            cache_faults: AtomicU64::new(0),
        }
    }

    /// The identity scheme in effect.
    pub const fn identity_scheme(&self) -> IdentityScheme {
        self.scheme
    }

    /// Number of cache operations that have failed since startup.
    pub fn cache_faults(&self) -> u64 {
        self.cache_faults.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Create a post.
    ///
    /// The store insert is the write of record. The identifier mapping,
    /// the body entry and the global counter are updated afterwards and
    /// their failures never fail the request.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Store`] if the insert fails.
    pub async fn create_post(&self, body: &str) -> Result<Post, FeedError> {
        let record = self
            .store
            .insert_post(body)
            .await
            .map_err(|e| escalate("insert post", e))?;

        self.remember_key(&record.id, record.key).await;
        let body_key = keys::post_body(&record.id);
        let stored = self.cache.set(&body_key, &record.body).await;
        self.advisory("cache post body", &body_key, stored);
        self.adjust_counter(keys::TOTAL_POSTS, Step::Up, self.store.count_posts())
            .await;

        tracing::debug!(post_id = %record.id, key = %record.key, "Post created");
        Ok(Post {
            id: record.id,
            body: record.body,
            comments: None,
            comment_count: 0,
        })
    }

    /// List one page of posts, newest first.
    ///
    /// `limit` is clamped by [`PageLimit::clamp`]. `cursor` is the id of
    /// the last post on the previous page; an empty cursor means the first
    /// page. The total and the per-post comment counts prefer the cache and
    /// are backfilled from the store on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Store`] if the page query fails, or if a count
    /// is missing from the cache and the store cannot produce it either.
    pub async fn list_posts(
        &self,
        limit: Option<i64>,
        cursor: Option<&str>,
    ) -> Result<PostPage, FeedError> {
        let limit = PageLimit::clamp(limit);
        let before = match cursor.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(self.resolve_cursor(raw).await),
            None => None,
        };

        let records = self
            .store
            .list_posts(limit.get(), before.as_ref())
            .await
            .map_err(|e| escalate("list posts", e))?;
        let total = self.total_posts().await?;
        let counts = self.comment_counts(&records).await?;

        let next_cursor = records.last().map(|record| record.id.clone());
        let posts = records
            .into_iter()
            .zip(counts)
            .map(|(record, comment_count)| Post {
                id: record.id,
                body: record.body,
                comments: None,
                comment_count,
            })
            .collect();

        Ok(PostPage {
            posts,
            limit: limit.get(),
            total,
            next_cursor,
        })
    }

    /// Read one post with its comments.
    ///
    /// The body prefers the cache. Comments always come from the store and
    /// their count overwrites the cached counter, which makes this the
    /// repair path for comment counts.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an empty id,
    /// [`FeedError::NotFound`] if the post does not exist, and
    /// [`FeedError::Store`] if the store fails where it is needed.
    pub async fn get_post(&self, raw_id: &str) -> Result<Post, FeedError> {
        let id = self.parse_id(raw_id)?.ok_or_else(|| not_found(raw_id))?;

        let body_key = keys::post_body(&id);
        let cached = self.cache.get(&body_key).await;
        let body = match self.advisory("read post body", &body_key, cached).flatten() {
            Some(body) => body,
            None => {
                let record = self
                    .store
                    .get_post(&id)
                    .await
                    .map_err(|e| escalate("get post", e))?
                    .ok_or_else(|| not_found(raw_id))?;
                let stored = self.cache.set(&body_key, &record.body).await;
                self.advisory("backfill post body", &body_key, stored);
                self.remember_key(&record.id, record.key).await;
                record.body
            }
        };

        let comments = self
            .store
            .list_comments(&id)
            .await
            .map_err(|e| escalate("list comments", e))?;
        let comment_count = i64::try_from(comments.len()).unwrap_or(i64::MAX);

        let count_key = keys::comment_count(&id);
        let repaired = Counter::new(self.cache.as_ref(), count_key.as_str())
            .set(comment_count)
            .await;
        self.advisory("repair comment count", &count_key, repaired);

        Ok(Post {
            id,
            body,
            comments: Some(comments),
            comment_count,
        })
    }

    /// Delete a post.
    ///
    /// Deleting a post that does not exist succeeds without side effects
    /// on the counters, so repeated deletes all report the same outcome.
    /// Comment rows are not removed.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an empty id and
    /// [`FeedError::Store`] if the delete fails.
    pub async fn delete_post(&self, raw_id: &str) -> Result<(), FeedError> {
        let Some(id) = self.parse_id(raw_id)? else {
            tracing::debug!(post_id = raw_id, "Unrecognized id, nothing to delete");
            return Ok(());
        };

        let removed = self
            .store
            .delete_post(&id)
            .await
            .map_err(|e| escalate("delete post", e))?;

        let entries = keys::per_post(&id);
        let cleared = self.cache.del(&entries).await;
        self.advisory("clear post entries", &keys::post_body(&id), cleared);

        if removed > 0 {
            self.adjust_counter(keys::TOTAL_POSTS, Step::Down, self.store.count_posts())
                .await;
        }

        tracing::debug!(post_id = %id, removed, "Post deleted");
        Ok(())
    }

    /// Add a comment to a post.
    ///
    /// The post's internal key is resolved before anything is written,
    /// preferring the cached identifier mapping.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Validation`] for an empty id,
    /// [`FeedError::NotFound`] if the post does not exist, and
    /// [`FeedError::Store`] if resolution or the insert fails.
    pub async fn add_comment(&self, raw_post_id: &str, body: &str) -> Result<Comment, FeedError> {
        let post_id = self
            .parse_id(raw_post_id)?
            .ok_or_else(|| not_found(raw_post_id))?;

        let post_key = match self.cached_key(&post_id).await {
            Some(key) => key,
            None => {
                let key = self
                    .store
                    .resolve_internal_key(&post_id)
                    .await
                    .map_err(|e| escalate("resolve post key", e))?
                    .ok_or_else(|| not_found(raw_post_id))?;
                self.remember_key(&post_id, key).await;
                key
            }
        };

        let id = self
            .store
            .insert_comment(body, post_key)
            .await
            .map_err(|e| escalate("insert comment", e))?;

        let count_key = keys::comment_count(&post_id);
        self.adjust_counter(&count_key, Step::Up, self.store.count_comments(&post_id))
            .await;

        tracing::debug!(post_id = %post_id, comment_id = %id, "Comment added");
        Ok(Comment {
            id,
            body: body.to_owned(),
            post_id,
        })
    }

    /// Check that the store is reachable and usable.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Store`] if the health check fails.
    pub async fn check_store(&self) -> Result<(), FeedError> {
        self.store.health_check().await.map_err(FeedError::Store)
    }

    // =========================================================================
    // Cache-aside helpers
    // =========================================================================

    /// Downgrade a cache failure to a log line and a fault count.
    fn advisory<T>(&self, op: &'static str, key: &str, result: Result<T, CacheError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.cache_faults.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    op,
                    key,
                    error = %e,
                    "Cache operation failed, continuing without it"
                );
                None
            }
        }
    }

    /// Validate a path identifier. `Ok(None)` means the active scheme could
    /// never have produced it.
    fn parse_id(&self, raw: &str) -> Result<Option<ExternalId>, FeedError> {
        if raw.trim().is_empty() {
            return Err(FeedError::Validation(String::from("missing post id")));
        }
        Ok(self.scheme.recognizes(raw).then(|| ExternalId::from(raw)))
    }

    /// Read the identifier-mapping entry for a post.
    async fn cached_key(&self, id: &ExternalId) -> Option<InternalKey> {
        let mapping = keys::post_key(id);
        let cached = self.cache.get(&mapping).await;
        let raw = self.advisory("read post key", &mapping, cached).flatten()?;
        let parsed = raw.parse::<InternalKey>().map_err(|e| CacheError::UnexpectedValue {
            key: mapping.clone(),
            message: format!("not an internal key: {e}"),
        });
        self.advisory("parse post key", &mapping, parsed)
    }

    /// Write the identifier-mapping entry for a post.
    async fn remember_key(&self, id: &ExternalId, key: InternalKey) {
        let mapping = keys::post_key(id);
        let stored = self.cache.set(&mapping, &key.to_string()).await;
        self.advisory("cache post key", &mapping, stored);
    }

    /// Turn a cursor into a page start, preferring the cached mapping.
    ///
    /// Never fails: anything that cannot be resolved to a key degrades to
    /// the by-identifier subquery.
    async fn resolve_cursor(&self, raw: &str) -> PageCursor {
        let id = ExternalId::from(raw);
        if !self.scheme.recognizes(raw) {
            return PageCursor::External(id);
        }
        if let Some(key) = self.cached_key(&id).await {
            return PageCursor::Key(key);
        }
        match self.store.resolve_internal_key(&id).await {
            Ok(Some(key)) => {
                self.remember_key(&id, key).await;
                PageCursor::Key(key)
            }
            Ok(None) => PageCursor::External(id),
            Err(e) => {
                tracing::warn!(
                    cursor = %id,
                    error = %e,
                    "Cursor resolution failed, paging by identifier"
                );
                PageCursor::External(id)
            }
        }
    }

    /// Total number of posts, from the counter or a store count.
    async fn total_posts(&self) -> Result<i64, FeedError> {
        let counter = Counter::new(self.cache.as_ref(), keys::TOTAL_POSTS);
        let cached = counter.get().await;
        if let Some(total) = self.advisory("read post total", keys::TOTAL_POSTS, cached).flatten() {
            return Ok(total);
        }

        let total = self
            .store
            .count_posts()
            .await
            .map_err(|e| escalate("count posts", e))?;
        let stored = counter.set(total).await;
        self.advisory("backfill post total", keys::TOTAL_POSTS, stored);
        Ok(total)
    }

    /// Comment counts for a page, in page order.
    ///
    /// One multi-key read covers the page; each miss or bad entry falls
    /// back to a store count for that post alone and backfills its counter.
    async fn comment_counts(&self, records: &[PostRecord]) -> Result<Vec<i64>, FeedError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let count_keys: Vec<String> = records
            .iter()
            .map(|record| keys::comment_count(&record.id))
            .collect();
        let batch = self.cache.mget(&count_keys).await;
        let mut cached = self
            .advisory("read comment counts", "post:*:comment_count", batch)
            .unwrap_or_default()
            .into_iter();

        let mut counts = Vec::with_capacity(records.len());
        for (record, key) in records.iter().zip(&count_keys) {
            let hit = cached.next().and_then(|entry| {
                let parsed =
                    entry.and_then(|raw| raw.map(|raw| parse_count(key, &raw)).transpose());
                self.advisory("read comment count", key, parsed).flatten()
            });
            let count = match hit {
                Some(count) => count,
                None => {
                    let count = self
                        .store
                        .count_comments(&record.id)
                        .await
                        .map_err(|e| escalate("count comments", e))?;
                    let stored = Counter::new(self.cache.as_ref(), key.as_str())
                        .set(count)
                        .await;
                    self.advisory("backfill comment count", key, stored);
                    count
                }
            };
            counts.push(count);
        }
        Ok(counts)
    }

    /// Apply get-then-adjust-or-recount to one counter.
    async fn adjust_counter<F>(&self, key: &str, step: Step, recount: F)
    where
        F: Future<Output = Result<i64, StoreError>> + Send,
    {
        let counter = Counter::new(self.cache.as_ref(), key);
        match counter.get().await {
            Ok(Some(_)) => {
                let adjusted = match step {
                    Step::Up => counter.incr().await,
                    Step::Down => counter.decr().await,
                };
                self.advisory("adjust counter", key, adjusted);
            }
            Ok(None) => self.recount(&counter, recount).await,
            Err(e @ CacheError::UnexpectedValue { .. }) => {
                self.advisory::<()>("read counter", key, Err(e));
                self.recount(&counter, recount).await;
            }
            Err(e) => {
                self.advisory::<()>("read counter", key, Err(e));
            }
        }
    }

    /// Overwrite a counter with a fresh store count, leaving it Absent if
    /// the count fails.
    async fn recount<F>(&self, counter: &Counter<'_>, recount: F)
    where
        F: Future<Output = Result<i64, StoreError>> + Send,
    {
        match recount.await {
            Ok(count) => {
                let stored = counter.set(count).await;
                self.advisory("recount counter", counter.key(), stored);
            }
            Err(e) => {
                tracing::warn!(
                    key = counter.key(),
                    error = %e,
                    "Recount failed, counter left absent"
                );
            }
        }
    }
}

/// Log a store failure that fails the request.
fn escalate(op: &'static str, error: StoreError) -> FeedError {
    tracing::error!(op, error = %error, "Store operation failed");
    FeedError::Store(error)
}

fn not_found(raw_id: &str) -> FeedError {
    FeedError::NotFound(format!("post {raw_id}"))
}
