//! Caching layer for materialized pages.
//!
//! Provides a [`ResultCache`] trait with two implementations:
//! - [`RedisCache`] - Production Redis-backed cache shared across instances
//! - [`MemoryCache`] - In-process moka cache for single-instance or fallback use

mod memory_cache;
mod redis_cache;
mod service;

pub use memory_cache::MemoryCache;
pub use redis_cache::RedisCache;
pub use service::{CacheError, CacheResult, ResultCache};

#[cfg(test)]
pub use service::MockResultCache;
