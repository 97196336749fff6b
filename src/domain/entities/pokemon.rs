//! Pokemon entity resolved from a single upstream detail call.

use serde::{Deserialize, Serialize};

/// A fully resolved Pokemon record.
///
/// Only the fields listed here are read from the upstream payload; everything
/// else in the PokeAPI document is discarded during deserialization. `name`
/// and `id` are required, the remaining fields are extracted on a best-effort
/// basis and stay `None` when missing or `null` upstream.
///
/// Identity is [`Pokemon::id`]. Records are immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    pub name: String,
    #[serde(default)]
    pub weight: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub location_area_encounters: Option<String>,
    #[serde(default)]
    pub base_experience: Option<i32>,
    pub id: i64,
}

impl Pokemon {
    /// Creates a record with every optional field populated.
    pub fn new(
        id: i64,
        name: String,
        weight: i32,
        height: i32,
        location_area_encounters: String,
        base_experience: i32,
    ) -> Self {
        Self {
            name,
            weight: Some(weight),
            height: Some(height),
            location_area_encounters: Some(location_area_encounters),
            base_experience: Some(base_experience),
            id,
        }
    }
}
