//! Result cache trait and error types.

use crate::domain::cache_key::{CacheKey, KeyPattern};
use crate::domain::entities::Pokemon;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Backend unreachable or a command failed.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// A value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store of resolved entities with per-entry TTL and glob-based
/// key enumeration.
///
/// Entries whose TTL has elapsed are absent from both [`ResultCache::get`]
/// and [`ResultCache::enumerate`]. Writes to distinct keys are independent;
/// no cross-key atomicity is provided.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed, shared across instances
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process moka cache
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Returns a snapshot of every live entity whose key matches `pattern`.
    ///
    /// Order is whatever the backend yields. Values that fail to decode are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    async fn enumerate(&self, pattern: &KeyPattern) -> CacheResult<Vec<Pokemon>>;

    /// Retrieves a single entity.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(pokemon))` on cache hit
    /// - `Ok(None)` on miss or expired entry
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Pokemon>>;

    /// Stores `pokemon` under `key`, replacing any previous value and
    /// restarting the TTL countdown.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    async fn set(&self, key: &CacheKey, pokemon: &Pokemon, ttl: Duration) -> CacheResult<()>;

    /// Checks if the cache backend is healthy.
    ///
    /// Used by the health endpoint to report cache status.
    async fn health_check(&self) -> bool;

    /// Backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;
}
