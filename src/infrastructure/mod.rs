//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for upstream access, caching, and queueing.
//!
//! # Modules
//!
//! - [`cache`] - Result cache abstractions (Redis and in-memory implementations)
//! - [`http`] - PokeAPI client over reqwest
//! - [`queue`] - Redis list message source for the query consumer

pub mod cache;
pub mod http;
pub mod queue;
