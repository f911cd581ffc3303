//! In-memory implementations of [`EntityStore`] and [`KeyValueStore`].
//!
//! Both can be switched into an unreachable state at runtime so callers
//! can exercise the fallback and failure paths without live services.
//! [`MemoryStore`] also counts the queries it serves, which lets a test
//! tell a cache hit from a store fallback.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ddfeed_types::{Comment, ExternalId, IdentityScheme, InternalKey};
use tokio::sync::Mutex;

use crate::error::{CacheError, StoreError};
use crate::kv::{KeyValueStore, parse_count};
use crate::store::{EntityStore, PageCursor, PostRecord};

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

/// A [`KeyValueStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    unreachable: AtomicBool,
}

impl MemoryCache {
    /// Create an empty, reachable cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent command fail (`false`) or succeed (`true`).
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Read an entry directly, bypassing the reachability switch.
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Write an entry directly, bypassing the reachability switch.
    pub async fn plant(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable(String::from(
                "memory cache switched off",
            )));
        }
        Ok(())
    }

    async fn adjust(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        self.check()?;
        let mut entries = self.entries.lock().await;
        let current = entries
            .get(key)
            .map(|raw| parse_count(key, raw))
            .transpose()?
            .unwrap_or(0);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::UnexpectedValue {
                key: key.to_owned(),
                message: String::from("increment or decrement would overflow"),
            })?;
        entries.insert(key.to_owned(), next.to_string());
        Ok(next)
    }
}

#[async_trait]
impl KeyValueStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        self.adjust(key, 1).await
    }

    async fn decr(&self, key: &str) -> Result<i64, CacheError> {
        self.adjust(key, -1).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.check()?;
        let mut entries = self.entries.lock().await;
        let removed = keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn mget(
        &self,
        keys: &[String],
    ) -> Result<Vec<Result<Option<String>, CacheError>>, CacheError> {
        self.check()?;
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .map(|key| Ok(entries.get(key.as_str()).cloned()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    posts: BTreeMap<InternalKey, PostRecord>,
    /// Comment rows: (comment key, external id, body, owning post key).
    comments: Vec<(InternalKey, ExternalId, String, InternalKey)>,
    next_key: i64,
}

impl Tables {
    fn assign_key(&mut self) -> Result<InternalKey, StoreError> {
        self.next_key = self
            .next_key
            .checked_add(1)
            .ok_or_else(|| StoreError::Constraint(String::from("key sequence exhausted")))?;
        Ok(InternalKey(self.next_key))
    }

    fn key_of(&self, id: &ExternalId) -> Option<InternalKey> {
        self.posts
            .values()
            .find(|post| &post.id == id)
            .map(|post| post.key)
    }

    fn comments_of(&self, post_key: InternalKey) -> impl Iterator<Item = Comment> + '_ {
        let post_id = self.posts.get(&post_key).map(|post| post.id.clone());
        self.comments
            .iter()
            .filter(move |(_, _, _, owner)| *owner == post_key)
            .filter_map(move |(_, id, body, _)| {
                post_id.clone().map(|post_id| Comment {
                    id: id.clone(),
                    body: body.clone(),
                    post_id,
                })
            })
    }
}

/// Query counters kept by [`MemoryStore`].
#[derive(Debug, Default)]
pub struct StoreStats {
    post_reads: AtomicUsize,
    key_resolutions: AtomicUsize,
    post_counts: AtomicUsize,
    comment_counts: AtomicUsize,
}

impl StoreStats {
    /// Number of single-post lookups served.
    pub fn post_reads(&self) -> usize {
        self.post_reads.load(Ordering::SeqCst)
    }

    /// Number of external-to-internal key resolutions served.
    pub fn key_resolutions(&self) -> usize {
        self.key_resolutions.load(Ordering::SeqCst)
    }

    /// Number of global post counts served.
    pub fn post_counts(&self) -> usize {
        self.post_counts.load(Ordering::SeqCst)
    }

    /// Number of per-post comment counts served.
    pub fn comment_counts(&self) -> usize {
        self.comment_counts.load(Ordering::SeqCst)
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// An [`EntityStore`] backed by ordered maps.
///
/// Like the relational schema, comments reference posts by internal key
/// and are not removed when their post is deleted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    scheme: IdentityScheme,
    tables: Mutex<Tables>,
    unreachable: AtomicBool,
    counts_failing: AtomicBool,
    stats: StoreStats,
}

impl MemoryStore {
    /// Create an empty store that assigns identifiers with `scheme`.
    pub fn new(scheme: IdentityScheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }

    /// Make every subsequent query fail (`false`) or succeed (`true`).
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Make only the two count queries fail (`true`) while every other
    /// query keeps working.
    pub fn set_counts_failing(&self, failing: bool) {
        self.counts_failing.store(failing, Ordering::SeqCst);
    }

    /// Query counters.
    pub const fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Total comment rows, including orphans of deleted posts.
    pub async fn comment_rows(&self) -> usize {
        self.tables.lock().await.comments.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(String::from(
                "memory store switched off",
            )));
        }
        Ok(())
    }

    fn check_count(&self) -> Result<(), StoreError> {
        self.check()?;
        if self.counts_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Query(String::from("count query failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn identity_scheme(&self) -> IdentityScheme {
        self.scheme
    }

    async fn insert_post(&self, body: &str) -> Result<PostRecord, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let key = tables.assign_key()?;
        let record = PostRecord {
            key,
            id: IdentityScheme::derive(self.scheme.mint(), key),
            body: body.to_owned(),
        };
        tables.posts.insert(key, record.clone());
        Ok(record)
    }

    async fn list_posts(
        &self,
        limit: u32,
        before: Option<&PageCursor>,
    ) -> Result<Vec<PostRecord>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let bound = match before {
            None => None,
            Some(PageCursor::Key(key)) => Some(*key),
            Some(PageCursor::External(id)) => match tables.key_of(id) {
                Some(key) => Some(key),
                None => return Ok(Vec::new()),
            },
        };
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(tables
            .posts
            .values()
            .rev()
            .filter(|post| bound.is_none_or(|bound| post.key < bound))
            .take(take)
            .cloned()
            .collect())
    }

    async fn get_post(&self, id: &ExternalId) -> Result<Option<PostRecord>, StoreError> {
        self.check()?;
        bump(&self.stats.post_reads);
        let tables = self.tables.lock().await;
        Ok(tables.posts.values().find(|post| &post.id == id).cloned())
    }

    async fn delete_post(&self, id: &ExternalId) -> Result<u64, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        match tables.key_of(id) {
            Some(key) => {
                tables.posts.remove(&key);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn count_posts(&self) -> Result<i64, StoreError> {
        self.check_count()?;
        bump(&self.stats.post_counts);
        let tables = self.tables.lock().await;
        i64::try_from(tables.posts.len()).map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn count_comments(&self, post_id: &ExternalId) -> Result<i64, StoreError> {
        self.check_count()?;
        bump(&self.stats.comment_counts);
        let tables = self.tables.lock().await;
        let count = tables
            .key_of(post_id)
            .map_or(0, |key| tables.comments_of(key).count());
        i64::try_from(count).map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn insert_comment(
        &self,
        body: &str,
        post_key: InternalKey,
    ) -> Result<ExternalId, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let key = tables.assign_key()?;
        let id = IdentityScheme::derive(self.scheme.mint(), key);
        tables
            .comments
            .push((key, id.clone(), body.to_owned(), post_key));
        Ok(id)
    }

    async fn list_comments(&self, post_id: &ExternalId) -> Result<Vec<Comment>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .key_of(post_id)
            .map(|key| tables.comments_of(key).collect())
            .unwrap_or_default())
    }

    async fn resolve_internal_key(
        &self,
        id: &ExternalId,
    ) -> Result<Option<InternalKey>, StoreError> {
        self.check()?;
        bump(&self.stats.key_resolutions);
        Ok(self.tables.lock().await.key_of(id))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check()
    }
}
