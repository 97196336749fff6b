//! Application layer: orchestration and failure isolation.
//!
//! This layer coordinates the upstream traits and the cache into the
//! cache-aside aggregation flow consumed by the HTTP and queue entry points.
//!
//! # Modules
//!
//! - [`services::pokemon_service::PokemonService`] - Cache-aside page aggregation
//! - [`circuit_breaker`] - Per-operation circuit breakers with fallback support
//! - [`query_worker`] - Queue consumer resolving single references

pub mod circuit_breaker;
pub mod query_worker;
pub mod services;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakers, CircuitError, CircuitState,
};
