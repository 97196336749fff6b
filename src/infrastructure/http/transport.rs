//! Thin JSON-over-HTTP GET transport.

use crate::domain::errors::UpstreamError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP GET client bound to a base URL.
///
/// All methods map failures to [`UpstreamError`]:
/// - connection, TLS and timeout failures → [`UpstreamError::Network`]
/// - non-2xx responses → [`UpstreamError::Status`]
/// - bodies that do not decode into the target type → [`UpstreamError::Decode`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidUrl`] if `base_url` does not parse or
    /// cannot carry path segments, and [`UpstreamError::Network`] if the
    /// underlying client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let base_url =
            Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(format!(
                "{} cannot be used as a base url",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Builds `<base>/<path>?<query>`; an empty `path` targets the base itself.
    pub fn url_for(&self, path: &str, query: &[(&str, String)]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();

        if !path.is_empty() {
            url.path_segments_mut()
                .map_err(|_| {
                    UpstreamError::InvalidUrl(format!("{} cannot carry a path", self.base_url))
                })?
                .pop_if_empty()
                .push(path);
        }

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }

    /// Performs a GET and decodes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// See the type-level documentation for the error mapping.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = self.url_for(path, query)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for_list_query() {
        let url = transport("https://pokeapi.co/api/v2/pokemon")
            .url_for("", &[("limit", "20".to_string())])
            .unwrap();

        assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon?limit=20");
    }

    #[test]
    fn test_url_for_detail_path() {
        let url = transport("https://pokeapi.co/api/v2/pokemon")
            .url_for("25", &[])
            .unwrap();

        assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon/25");
    }

    #[test]
    fn test_url_for_base_with_trailing_slash() {
        let url = transport("https://pokeapi.co/api/v2/pokemon/")
            .url_for("25", &[])
            .unwrap();

        assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon/25");
    }

    #[test]
    fn test_new_rejects_invalid_base() {
        assert!(matches!(
            HttpTransport::new("not a url", Duration::from_secs(1)),
            Err(UpstreamError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTransport::new("mailto:ash@example.com", Duration::from_secs(1)),
            Err(UpstreamError::InvalidUrl(_))
        ));
    }
}
