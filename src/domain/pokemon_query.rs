//! Query payload consumed from the message queue.

use crate::domain::entities::Reference;
use serde::{Deserialize, Serialize};

/// A request to resolve one Pokemon, delivered as `{"url": "..."}`.
///
/// # Usage Flow
///
/// 1. A producer pushes the JSON payload onto the queue
/// 2. [`crate::application::query_worker::run_query_worker`] receives and parses it
/// 3. The reference is resolved through the shared fetch breaker
/// 4. The result is logged; no reply is published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonQuery {
    pub url: String,
}

impl PokemonQuery {
    /// Parses a raw message body.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the body is not a `{"url": string}` object.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.url.clone())
    }
}
