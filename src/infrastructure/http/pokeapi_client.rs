//! PokeAPI implementation of the upstream traits.

use super::transport::HttpTransport;
use crate::domain::entities::{Pokemon, Reference, ReferencePage};
use crate::domain::errors::UpstreamError;
use crate::domain::repositories::{EntityFetcher, ReferenceLister};
use async_trait::async_trait;
use std::time::Duration;

/// Client for `GET <base>?limit=N` and `GET <base>/<id>`.
#[derive(Debug, Clone)]
pub struct PokeApiClient {
    transport: HttpTransport,
}

impl PokeApiClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Builds a client for `base_url` (e.g. `https://pokeapi.co/api/v2/pokemon`).
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidUrl`] if the base URL is unusable.
    pub fn connect(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self::new(HttpTransport::new(base_url, timeout)?))
    }
}

fn record<T>(operation: &'static str, result: &Result<T, UpstreamError>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(
        "upstream_requests_total",
        "operation" => operation,
        "result" => outcome
    )
    .increment(1);
}

#[async_trait]
impl ReferenceLister for PokeApiClient {
    async fn list_references(&self, limit: u32) -> Result<ReferencePage, UpstreamError> {
        let result = self
            .transport
            .get_json("", &[("limit", limit.to_string())])
            .await;
        record("list", &result);
        result
    }
}

#[async_trait]
impl EntityFetcher for PokeApiClient {
    async fn fetch_by_reference(&self, reference: &Reference) -> Result<Pokemon, UpstreamError> {
        let result = self
            .transport
            .get_json(reference.resource_id(), &[])
            .await;
        record("fetch", &result);
        result
    }
}
