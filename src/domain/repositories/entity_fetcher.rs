//! Upstream trait for resolving a reference into a full entity.

use crate::domain::entities::{Pokemon, Reference};
use crate::domain::errors::UpstreamError;
use async_trait::async_trait;

/// Resolves a single [`Reference`] into a [`Pokemon`].
///
/// The lookup id comes from [`Reference::resource_id`]. One outbound call
/// per invocation, no retries.
///
/// # Implementations
///
/// - [`crate::infrastructure::http::PokeApiClient`] - PokeAPI over HTTP
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    /// Fetches the entity behind `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on network failure, non-2xx status (including
    /// the 404 produced by the `"0"` fallback id) or an undecodable body.
    async fn fetch_by_reference(&self, reference: &Reference) -> Result<Pokemon, UpstreamError>;
}
