//! Query parameters and response body of the page endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use crate::application::services::PageOutcome;
use crate::domain::entities::Pokemon;

/// Page size used when `limit` is omitted.
pub const DEFAULT_LIMIT: u32 = 20;

/// Largest accepted page size.
pub const MAX_LIMIT: u32 = 2000;

/// Query parameters of the page endpoints.
///
/// Uses `serde_with` to parse `limit` from the query string as an integer.
#[serde_as]
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PageParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    #[validate(range(min = 1, max = 2000, message = "limit must be between 1 and 2000"))]
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

/// Body of a page response.
///
/// Resolved entities are returned as `200 [ {...}, ... ]`; a degraded page
/// is `503 [ "Service is currently unavailable due to: ..." ]`.
#[derive(Debug)]
pub enum PageResponse {
    Entities(Vec<Pokemon>),
    Degraded(String),
}

impl From<PageOutcome> for PageResponse {
    fn from(outcome: PageOutcome) -> Self {
        match outcome {
            PageOutcome::Entities(entities) => PageResponse::Entities(entities),
            PageOutcome::Degraded(message) => PageResponse::Degraded(message),
        }
    }
}

impl IntoResponse for PageResponse {
    fn into_response(self) -> Response {
        match self {
            PageResponse::Entities(entities) => (StatusCode::OK, Json(entities)).into_response(),
            PageResponse::Degraded(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(vec![message])).into_response()
            }
        }
    }
}
