//! Upstream HTTP integration.
//!
//! - [`HttpTransport`] - reqwest-based JSON GET transport with error mapping
//! - [`PokeApiClient`] - [`crate::domain::repositories::ReferenceLister`] and
//!   [`crate::domain::repositories::EntityFetcher`] over PokeAPI

mod pokeapi_client;
mod transport;

pub use pokeapi_client::PokeApiClient;
pub use transport::HttpTransport;
