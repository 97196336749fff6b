//! Domain layer containing the upstream data model and contracts.
//!
//! This module defines entities, cache key construction, and the upstream
//! traits implemented by the infrastructure layer.
//!
//! # Architecture
//!
//! - [`entities`] - Pokemon and reference page data structures
//! - [`repositories`] - Upstream lister and fetcher trait definitions
//! - [`cache_key`] - Entry keys and per-limit enumeration patterns
//! - [`errors`] - Upstream and fetch error types
//! - [`pokemon_query`] - Queue payload model
//!
//! # Design Principles
//!
//! - Domain layer has no dependencies on infrastructure or presentation layers
//! - Upstream traits define contracts implemented by the infrastructure layer
//! - Orchestration lives in services (see [`crate::application::services`])

pub mod cache_key;
pub mod entities;
pub mod errors;
pub mod pokemon_query;
pub mod repositories;
