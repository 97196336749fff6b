//! Handler for the aggregated Pokemon page.

use axum::extract::{Query, State, rejection::QueryRejection};
use serde_json::json;
use validator::Validate;

use crate::api::dto::pokemon::{PageParams, PageResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Returns the first `limit` Pokemon, resolved and cached.
///
/// # Endpoints
///
/// `GET /pokemon` and `GET /api/list/pokemon`
///
/// # Query Parameters
///
/// - `limit` (optional): Page size, 1 to 2000 (default: 20)
///
/// # Response Codes
///
/// - **200 OK**: JSON array of entities (possibly empty)
/// - **400 Bad Request**: `limit` is not a number or out of range
/// - **503 Service Unavailable**: Upstream listing failed or its circuit is
///   open; body is a one-element array with the diagnostic
///
/// # Example
///
/// ```text
/// GET /pokemon?limit=2
///
/// [
///   { "name": "bulbasaur", "weight": 69, "height": 7, "id": 1, ... },
///   { "name": "ivysaur", "weight": 130, "height": 10, "id": 2, ... }
/// ]
/// ```
pub async fn list_pokemon_handler(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<PageResponse, AppError> {
    let Query(params) = params.map_err(|e| {
        AppError::bad_request(
            "Invalid query parameters",
            json!({ "reason": e.body_text() }),
        )
    })?;
    params.validate()?;

    let outcome = state.pokemon_service.fetch_page(params.limit()).await;

    Ok(outcome.into())
}
