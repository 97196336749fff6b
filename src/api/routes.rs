//! API route configuration.

use crate::api::handlers::list_pokemon_handler;
use crate::state::AppState;
use axum::{Router, routing::get};

/// Page endpoints.
///
/// # Endpoints
///
/// - `GET /pokemon?limit=N`          - Aggregated page, cache-aside
/// - `GET /api/list/pokemon?limit=N` - Same page under the listing path
pub fn pokemon_routes() -> Router<AppState> {
    Router::new()
        .route("/pokemon", get(list_pokemon_handler))
        .route("/api/list/pokemon", get(list_pokemon_handler))
}
