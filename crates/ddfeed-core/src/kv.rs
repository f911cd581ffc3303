//! The key-value cache capability.
//!
//! [`KeyValueStore`] mirrors the handful of commands the coordinator
//! needs. Each call is atomic for its own key only; nothing here spans
//! keys transactionally. Values are UTF-8 strings.

use async_trait::async_trait;

use crate::error::CacheError;

/// Key-value commands used by the coordinator.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value with no expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Atomically increment an integer value, returning the new value.
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    /// Atomically decrement an integer value, returning the new value.
    async fn decr(&self, key: &str) -> Result<i64, CacheError>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Read several values in one round trip.
    ///
    /// The outer error means the whole call failed. Otherwise the result
    /// holds one entry per requested key, in order, each of which may have
    /// failed on its own.
    async fn mget(
        &self,
        keys: &[String],
    ) -> Result<Vec<Result<Option<String>, CacheError>>, CacheError>;
}

/// A typed handle over one integer counter key.
pub struct Counter<'a> {
    kv: &'a dyn KeyValueStore,
    key: String,
}

impl<'a> Counter<'a> {
    /// Bind a counter to `key`.
    pub fn new(kv: &'a dyn KeyValueStore, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// The key this counter lives at.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the counter. `Ok(None)` means Absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnexpectedValue`] if the stored value is not
    /// an integer.
    pub async fn get(&self) -> Result<Option<i64>, CacheError> {
        self.kv
            .get(&self.key)
            .await?
            .map(|raw| parse_count(&self.key, &raw))
            .transpose()
    }

    /// Increment the counter.
    pub async fn incr(&self) -> Result<i64, CacheError> {
        self.kv.incr(&self.key).await
    }

    /// Decrement the counter.
    pub async fn decr(&self) -> Result<i64, CacheError> {
        self.kv.decr(&self.key).await
    }

    /// Overwrite the counter with an authoritative value.
    pub async fn set(&self, value: i64) -> Result<(), CacheError> {
        self.kv.set(&self.key, &value.to_string()).await
    }
}

/// Parse a cached counter value.
///
/// # Errors
///
/// Returns [`CacheError::UnexpectedValue`] if `raw` is not an integer.
pub fn parse_count(key: &str, raw: &str) -> Result<i64, CacheError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| CacheError::UnexpectedValue {
            key: key.to_owned(),
            message: format!("not an integer: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCache;

    #[tokio::test]
    async fn absent_counter_reads_as_none() {
        let cache = MemoryCache::new();
        let counter = Counter::new(&cache, "c");
        assert_eq!(counter.get().await, Ok(None));
    }

    #[tokio::test]
    async fn counter_adjusts_and_overwrites() {
        let cache = MemoryCache::new();
        let counter = Counter::new(&cache, "c");
        assert_eq!(counter.set(4).await, Ok(()));
        assert_eq!(counter.incr().await, Ok(5));
        assert_eq!(counter.decr().await, Ok(4));
        assert_eq!(counter.get().await, Ok(Some(4)));
    }

    #[tokio::test]
    async fn garbage_counter_is_an_error() {
        let cache = MemoryCache::new();
        let _ = cache.set("c", "lots").await;
        let counter = Counter::new(&cache, "c");
        assert!(matches!(
            counter.get().await,
            Err(CacheError::UnexpectedValue { .. })
        ));
    }
}
