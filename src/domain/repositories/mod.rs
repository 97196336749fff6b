//! Upstream trait definitions for the domain layer.
//!
//! These traits abstract the two remote calls the aggregation service
//! depends on. Concrete implementations live in
//! `crate::infrastructure::http`; mock implementations are generated via
//! `mockall` for testing.
//!
//! # Available Traits
//!
//! - [`ReferenceLister`] - Reference page listing
//! - [`EntityFetcher`] - Per-reference detail resolution

pub mod entity_fetcher;
pub mod reference_lister;

pub use entity_fetcher::EntityFetcher;
pub use reference_lister::ReferenceLister;

#[cfg(test)]
pub use entity_fetcher::MockEntityFetcher;
#[cfg(test)]
pub use reference_lister::MockReferenceLister;
