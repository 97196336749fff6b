//! Error types shared by the domain and application layers.

use thiserror::Error;

/// Failure of a single upstream call (list or detail).
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("upstream request failed: {0}")]
    Network(String),

    /// Upstream answered with a non-2xx status.
    #[error("upstream returned {status} for {url}")]
    Status { status: u16, url: String },

    /// Response body could not be decoded into the expected shape.
    #[error("invalid upstream payload: {0}")]
    Decode(String),

    /// Request URL could not be built from the base URL.
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

/// Failure of a breaker-guarded resolution surfaced to callers that opt out
/// of the fallback (the queue consumer).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("CircuitBreaker '{name}' is OPEN and does not permit further calls")]
    CircuitOpen { name: String },
}

pub type FetchResult<T> = Result<T, FetchError>;
