//! Reference pages returned by the upstream list endpoint.

use serde::{Deserialize, Serialize};

/// Segment of the reference URL that carries the resource id.
///
/// `https://pokeapi.co/api/v2/pokemon/25/` splits into
/// `["https:", "", "pokeapi.co", "api", "v2", "pokemon", "25"]`.
const ID_SEGMENT: usize = 6;

/// Id used when the reference URL is too short to carry one.
const FALLBACK_ID: &str = "0";

/// A pointer to a single Pokemon, as listed by the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Reference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
        }
    }

    /// Extracts the upstream lookup id from the reference URL.
    ///
    /// The URL is split on `/` with trailing empty segments dropped, so a
    /// trailing slash does not count as a segment. Segment 6 is the id when
    /// present; otherwise `"0"` is returned and the detail call is expected
    /// to fail upstream.
    pub fn resource_id(&self) -> &str {
        let segments: Vec<&str> = self.url.split('/').collect();
        let significant = segments
            .iter()
            .rposition(|segment| !segment.is_empty())
            .map_or(0, |last| last + 1);

        if significant > ID_SEGMENT {
            segments[ID_SEGMENT]
        } else {
            FALLBACK_ID
        }
    }
}

/// One page of references from the upstream list endpoint.
///
/// Transient: pages are never cached, only the entities they resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePage {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Reference>,
}

impl ReferencePage {
    /// Builds a page holding the given references.
    pub fn with_results(results: Vec<Reference>) -> Self {
        Self {
            count: Some(results.len() as i64),
            next: None,
            previous: None,
            results,
        }
    }
}
