//! Core domain entities.
//!
//! Entities are plain data structures mapped from the upstream payloads
//! through an explicit field allow-list; unknown upstream fields are dropped
//! during deserialization.
//!
//! # Entity Types
//!
//! - [`Pokemon`] - A fully resolved entity, the unit of caching
//! - [`Reference`] - A pointer to one entity as returned by the list call
//! - [`ReferencePage`] - One page of references (never cached)

pub mod pokemon;
pub mod reference;

pub use pokemon::Pokemon;
pub use reference::{Reference, ReferencePage};
