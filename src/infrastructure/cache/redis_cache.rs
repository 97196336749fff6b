//! Redis-backed result cache.

use super::service::{CacheError, CacheResult, ResultCache};
use crate::domain::cache_key::{CacheKey, KeyPattern};
use crate::domain::entities::Pokemon;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

/// Redis cache storing entities as JSON strings with `SET ... EX`.
///
/// Uses `ConnectionManager` for automatic reconnection. Unlike a fail-open
/// lookup cache, command failures are reported as
/// [`CacheError::Unavailable`] so the aggregation service can switch to its
/// upstream-only path.
pub struct RedisCache {
    client: ConnectionManager,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Arguments
    ///
    /// - `redis_url` - Redis connection string (e.g., `"redis://localhost:6379"`)
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the URL is invalid, the connection
    /// cannot be established, or the PING health check fails.
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        info!("Connecting to Redis cache");

        let client = Client::open(redis_url).map_err(|e| {
            CacheError::Unavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Unavailable(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self { client: manager })
    }

    /// Collects every key matching `pattern` with a non-blocking `SCAN` loop.
    async fn scan_keys(&self, pattern: &KeyPattern) -> CacheResult<Vec<String>> {
        let mut conn = self.client.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern.as_str())
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Unavailable(format!("Redis SCAN failed: {}", e)))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

fn decode(key: &str, raw: &str) -> Option<Pokemon> {
    match serde_json::from_str(raw) {
        Ok(pokemon) => Some(pokemon),
        Err(e) => {
            warn!("Skipping undecodable cache value at {}: {}", key, e);
            None
        }
    }
}

#[async_trait]
impl ResultCache for RedisCache {
    async fn enumerate(&self, pattern: &KeyPattern) -> CacheResult<Vec<Pokemon>> {
        let keys = self.scan_keys(pattern).await?;
        if keys.is_empty() {
            debug!("Cache MISS: {}", pattern);
            return Ok(Vec::new());
        }

        let mut conn = self.client.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis MGET failed: {}", e)))?;

        // Keys that expired between SCAN and MGET come back as nil.
        let entities: Vec<Pokemon> = keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.and_then(|raw| decode(key, &raw)))
            .collect();

        debug!("Cache HIT: {} ({} entries)", pattern, entities.len());
        Ok(entities)
    }

    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Pokemon>> {
        let mut conn = self.client.clone();

        let raw = conn
            .get::<_, Option<String>>(key.as_str())
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis GET failed: {}", e)))?;

        Ok(raw.and_then(|raw| decode(key.as_str(), &raw)))
    }

    async fn set(&self, key: &CacheKey, pokemon: &Pokemon, ttl: Duration) -> CacheResult<()> {
        let payload =
            serde_json::to_string(pokemon).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let ttl_seconds = ttl.as_secs().max(1);
        let mut conn = self.client.clone();

        conn.set_ex::<_, _, ()>(key.as_str(), payload, ttl_seconds)
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis SET failed: {}", e)))?;

        debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
