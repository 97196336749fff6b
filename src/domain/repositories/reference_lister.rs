//! Upstream trait for listing reference pages.

use crate::domain::entities::ReferencePage;
use crate::domain::errors::UpstreamError;
use async_trait::async_trait;

/// Retrieves one page of Pokemon references from upstream.
///
/// Implementations perform exactly one outbound call per invocation and do
/// not retry; failure isolation is applied by the caller through
/// [`crate::application::CircuitBreaker`].
///
/// # Implementations
///
/// - [`crate::infrastructure::http::PokeApiClient`] - PokeAPI over HTTP
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferenceLister: Send + Sync {
    /// Lists the first `limit` references.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on network failure, non-2xx status or an
    /// undecodable body.
    async fn list_references(&self, limit: u32) -> Result<ReferencePage, UpstreamError>;
}
