//! `Valkey` (Redis-compatible) key-value commands.
//!
//! `Valkey` holds disposable projections of the relational store. Nothing
//! written here has an expiry; entries leave only when a post is deleted.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `post:{id}` | String | Post body |
//! | `post_pk:{id}` | Integer | Internal key of the post |
//! | `post:{id}:comment_count` | Integer | Comments on the post |
//! | `post:total_count` | Integer | Posts in the store |

use std::time::Duration;

use async_trait::async_trait;
use ddfeed_core::{CacheError, KeyValueStore};
use fred::prelude::*;

use crate::error::{DbError, cache_error};

/// Default per-command timeout in milliseconds.
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 500;

/// Default wait for the first connection in milliseconds.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Delay between reconnection attempts in milliseconds.
const RECONNECT_DELAY_MS: u32 = 1000;

/// Configuration for the `Valkey` client.
#[derive(Debug, Clone)]
pub struct ValkeyConfig {
    /// Redis-scheme URL: `redis://host:port` or `redis://host:port/db`.
    pub url: String,
    /// Upper bound on any single command, including time spent queued
    /// while the client reconnects.
    pub command_timeout: Duration,
    /// How long [`ValkeyPool::connect`] waits for the first connection.
    pub connect_timeout: Duration,
}

impl ValkeyConfig {
    /// Create a new configuration from a URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }

    /// Set the per-command timeout.
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the wait for the first connection.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Connection handle to a `Valkey` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] that reconnects on its own. While it
/// is disconnected every command fails within the command timeout.
#[derive(Clone)]
pub struct ValkeyPool {
    client: Client,
}

impl ValkeyPool {
    /// Build a client and start connecting.
    ///
    /// Waits at most `connect_timeout` for the first connection. If the
    /// server is not up by then the handle is returned anyway and keeps
    /// reconnecting in the background.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Valkey`] if the client cannot be built.
    pub async fn connect(config: &ValkeyConfig) -> Result<Self, DbError> {
        let mut client_config = Config::from_url(&config.url)
            .map_err(|e| DbError::Config(format!("Invalid Valkey URL: {e}")))?;
        client_config.fail_fast = true;

        let command_timeout = config.command_timeout;
        let client = Builder::from_config(client_config)
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .set_policy(ReconnectPolicy::new_constant(0, RECONNECT_DELAY_MS))
            .build()?;

        // The handle only reports the end of the connection task.
        let _connection = client.connect();
        match tokio::time::timeout(config.connect_timeout, client.wait_for_connect()).await {
            Ok(Ok(())) => tracing::info!("Connected to Valkey"),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Valkey unavailable at startup, serving from the store");
            }
            Err(_) => tracing::warn!(
                timeout_ms = u64::try_from(config.connect_timeout.as_millis()).unwrap_or(u64::MAX),
                "Valkey did not connect in time, serving from the store"
            ),
        }

        Ok(Self { client })
    }

    /// Connect using a URL with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the client cannot be built.
    pub async fn connect_url(url: &str) -> Result<Self, DbError> {
        Self::connect(&ValkeyConfig::new(url)).await
    }

    /// Whether the client currently holds a connection.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Flush all keys from the instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Valkey`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Close the connection.
    pub async fn close(&self) {
        if let Err(e) = self.client.quit().await {
            tracing::warn!(error = %e, "Valkey quit failed");
        }
        tracing::info!("Valkey client closed");
    }
}

#[async_trait]
impl KeyValueStore for ValkeyPool {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.client
            .get::<Option<String>, _>(key)
            .await
            .map_err(|e| cache_error(key, &e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.client
            .set::<(), _, _>(key, value, None, None, false)
            .await
            .map_err(|e| cache_error(key, &e))
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        self.client
            .incr::<i64, _>(key)
            .await
            .map_err(|e| cache_error(key, &e))
    }

    async fn decr(&self, key: &str) -> Result<i64, CacheError> {
        self.client
            .decr::<i64, _>(key)
            .await
            .map_err(|e| cache_error(key, &e))
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.client
            .del::<u64, _>(keys.to_vec())
            .await
            .map_err(|e| cache_error(&keys.join(" "), &e))
    }

    async fn mget(
        &self,
        keys: &[String],
    ) -> Result<Vec<Result<Option<String>, CacheError>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Value> = self
            .client
            .mget(keys.to_vec())
            .await
            .map_err(|e| cache_error(&keys.join(" "), &e))?;

        // Convert each reply on its own so one bad entry does not spoil
        // the rest.
        Ok(keys
            .iter()
            .zip(values)
            .map(|(key, value)| {
                value
                    .convert::<Option<String>>()
                    .map_err(|e| cache_error(key, &e))
            })
            .collect())
    }
}
