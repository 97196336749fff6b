//! In-process result cache backed by moka.
//!
//! Used when Redis is not configured or unreachable at startup, and by the
//! integration tests.

use super::service::{CacheResult, ResultCache};
use crate::domain::cache_key::{CacheKey, KeyPattern};
use crate::domain::entities::Pokemon;
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default maximum number of cached entities.
const DEFAULT_CAPACITY: u64 = 10_000;

/// Liveness is judged on the tokio clock so expiry follows a paused test
/// clock; moka's own eviction runs on wall time and only reclaims memory.
#[derive(Debug, Clone)]
struct CachedPokemon {
    pokemon: Pokemon,
    ttl: Duration,
    expires_at: Instant,
}

impl CachedPokemon {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Per-entry expiry: every insert, including an overwrite, restarts the
/// countdown with the TTL carried by the new value.
struct PerEntryTtl;

impl Expiry<String, CachedPokemon> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedPokemon,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedPokemon,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Concurrent in-memory cache with per-entry TTL.
///
/// Enumeration walks every key and applies the glob pattern, which is fine
/// for the bounded capacity this backend runs with.
pub struct MemoryCache {
    entries: Cache<String, CachedPokemon>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_capacity` entities.
    pub fn new(max_capacity: u64) -> Self {
        debug!("Using MemoryCache (capacity: {})", max_capacity);
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn enumerate(&self, pattern: &KeyPattern) -> CacheResult<Vec<Pokemon>> {
        let entities: Vec<Pokemon> = self
            .entries
            .iter()
            .filter(|(key, entry)| pattern.matches(key) && entry.is_live())
            .map(|(_, entry)| entry.pokemon)
            .collect();

        debug!("Cache enumerate: {} ({} entries)", pattern, entities.len());
        Ok(entities)
    }

    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Pokemon>> {
        Ok(self
            .entries
            .get(key.as_str())
            .await
            .filter(CachedPokemon::is_live)
            .map(|entry| entry.pokemon))
    }

    async fn set(&self, key: &CacheKey, pokemon: &Pokemon, ttl: Duration) -> CacheResult<()> {
        let entry = CachedPokemon {
            pokemon: pokemon.clone(),
            ttl,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.as_str().to_string(), entry).await;

        debug!("Cache SET: {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
