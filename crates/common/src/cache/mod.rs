//! Redis response cache
//!
//! Provides:
//! - Connection management
//! - Generic get/set operations with TTL
//! - Read-through loading that fails open when Redis is unavailable
//! - Deterministic cache keys from query parameters
//!
//! The cache is best-effort: correctness never depends on it, so every
//! backend failure degrades to a miss with a logged warning.

use crate::config::CacheConfig;
use crate::errors::{AppError, Result};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Bound on every Redis round-trip
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on establishing the Redis connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis cache client
pub struct Cache {
    connection: RwLock<MultiplexedConnection>,
    key_prefix: String,
}

impl Cache {
    /// Create a new cache client
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection_with_timeouts(RESPONSE_TIMEOUT, CONNECT_TIMEOUT)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let value: Option<String> =
            conn.get(&full_key)
                .await
                .map_err(|e| AppError::CacheError {
                    message: format!("Failed to get key '{}': {}", full_key, e),
                })?;

        let cache_name = key.split(':').next().unwrap_or("unknown");

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                debug!(key = %full_key, "Cache hit");
                crate::metrics::record_cache(true, cache_name);
                Ok(Some(parsed))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                crate::metrics::record_cache(false, cache_name);
                Ok(None)
            }
        }
    }

    /// Set a value in cache with a TTL
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let full_key = self.key(key);
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let mut conn = self.connection.write().await;
        conn.set_ex::<_, _, ()>(&full_key, &json, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Read-through load: cache hit wins, otherwise compute and store.
    ///
    /// Backend failures on either side fail open: the loader result is
    /// served uncached and the degraded state is logged. Loader errors
    /// propagate and are never cached.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl_secs: u64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, key, "Cache read failed, continuing without cache");
            }
        }

        let value = loader().await?;

        if let Err(e) = self.set_with_ttl(key, &value, ttl_secs).await {
            warn!(error = %e, key, "Failed to cache value, continuing without cache");
        }

        Ok(value)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    use super::*;

    /// Key prefix for /properties responses
    pub const PROPERTIES_PREFIX: &str = "properties";

    /// Key prefix for /properties/filters/metadata responses
    pub const METADATA_PREFIX: &str = "metadata";

    /// Build a deterministic cache key from query parameters.
    ///
    /// Parameters are serialized with keys in lexicographic order before
    /// hashing, so distinct orderings of identical parameters map to the
    /// same key.
    pub fn query_key<'a, I>(prefix: &str, params: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let sorted: BTreeMap<&str, &str> = params.into_iter().collect();
        let canonical =
            serde_json::to_string(&sorted).expect("string map serialization is infallible");

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hex::encode(hasher.finalize());

        format!("{}:{}", prefix, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_key_is_order_insensitive() {
        let a = keys::query_key(
            keys::PROPERTIES_PREFIX,
            vec![("min_price", "1500"), ("max_price", "2500"), ("page", "1")],
        );
        let b = keys::query_key(
            keys::PROPERTIES_PREFIX,
            vec![("page", "1"), ("max_price", "2500"), ("min_price", "1500")],
        );

        assert_eq!(a, b);
    }

    #[test]
    fn test_query_key_differs_on_values() {
        let a = keys::query_key(keys::PROPERTIES_PREFIX, vec![("page", "1")]);
        let b = keys::query_key(keys::PROPERTIES_PREFIX, vec![("page", "2")]);

        assert_ne!(a, b);
    }

    #[test]
    fn test_query_key_prefixes_are_disjoint() {
        let a = keys::query_key(keys::PROPERTIES_PREFIX, vec![]);
        let b = keys::query_key(keys::METADATA_PREFIX, vec![]);

        assert!(a.starts_with("properties:"));
        assert!(b.starts_with("metadata:"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_query_key_is_stable() {
        // The digest must not drift between releases: cached entries from a
        // previous deploy should still be addressable
        let key = keys::query_key(keys::PROPERTIES_PREFIX, vec![("page", "1")]);
        assert_eq!(key.len(), "properties:".len() + 64);
    }
}
