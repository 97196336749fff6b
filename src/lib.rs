//! # Pokemon Gateway
//!
//! A cache-aside aggregation gateway in front of PokeAPI, built with Axum and Redis.
//!
//! ## Architecture
//!
//! This crate follows Clean Architecture principles with clear layer separation:
//!
//! - **Domain Layer** ([`domain`]) - Entities, cache keys, and upstream traits
//! - **Application Layer** ([`application`]) - Aggregation service, circuit breakers, queue consumer
//! - **Infrastructure Layer** ([`infrastructure`]) - PokeAPI client, Redis/in-memory cache, Redis queue
//! - **API Layer** ([`api`]) - REST API handlers, DTOs, and middleware
//!
//! ## Features
//!
//! - Page aggregation with concurrent, failure-isolated detail fetches
//! - Per-limit result caching with TTL (Redis, or in-memory fallback)
//! - Circuit breakers with fallback diagnostics per upstream operation
//! - Queue consumer resolving single references in the background
//! - Rate limiting and observability
//!
//! ## Quick Start
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379"  # Optional
//! cargo run
//! curl 'http://localhost:8080/pokemon?limit=5'
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::circuit_breaker::{CircuitBreakerConfig, CircuitBreakers};
    pub use crate::application::services::{PageOutcome, PokemonService, ServiceSettings};
    pub use crate::domain::entities::{Pokemon, Reference, ReferencePage};
    pub use crate::error::AppError;
    pub use crate::state::AppState;
}
