//! Cache key construction for materialized pages.
//!
//! Every entity resolved for a page of size `limit` is written under
//! `pokemon<limit>:*<id>` and enumerated through the glob `pokemon<limit>:*`.
//! The `:` after the limit keeps patterns of distinct limits apart
//! (`pokemon1:*` never matches `pokemon12:*3`).

use std::fmt;

use glob::{Pattern, PatternError};

const KEY_PREFIX: &str = "pokemon";

/// Key of a single cached entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for entity `id` materialized under page size `limit`.
    pub fn entry(limit: u32, id: i64) -> Self {
        Self(format!("{KEY_PREFIX}{limit}:*{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Glob pattern selecting every entity of one page size.
///
/// The raw text is what Redis `SCAN MATCH` receives; the compiled
/// [`Pattern`] serves backends that filter keys in process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern {
    raw: String,
    compiled: Pattern,
}

impl KeyPattern {
    /// Pattern enumerating every entity cached for page size `limit`.
    pub fn page(limit: u32) -> Self {
        Self::parse(&format!("{KEY_PREFIX}{limit}:*"))
            .expect("page pattern is a literal prefix followed by a single *")
    }

    /// Compiles an arbitrary Redis-style glob (`*`, `?`, `[...]`).
    ///
    /// # Errors
    ///
    /// Returns the [`PatternError`] for malformed input such as an unclosed `[`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        Ok(Self {
            compiled: Pattern::new(raw)?,
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns whether `key` is selected by this pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.compiled.matches(key)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
