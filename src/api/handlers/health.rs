//! Handler for health check endpoint.

use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::application::circuit_breaker::CircuitState;
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: Cache unreachable or a circuit is open
///
/// # Components Checked
///
/// 1. **Cache**: Backend PING
/// 2. **Circuit breakers**: Current state of every registered breaker
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "cache": { "status": "ok", "message": "redis connected" },
///     "circuit_breakers": {
///       "fetch_pokemon": { "status": "ok", "message": "closed" },
///       "list_pokemon": { "status": "ok", "message": "closed" }
///     }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let cache_check = check_cache(&state).await;
    let breaker_checks = check_breakers(&state);

    let all_healthy = cache_check.is_ok() && breaker_checks.values().all(CheckStatus::is_ok);

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            cache: cache_check,
            circuit_breakers: breaker_checks,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Checks cache connectivity via the backend health probe.
async fn check_cache(state: &AppState) -> CheckStatus {
    let backend = state.cache.backend();
    if state.cache.health_check().await {
        CheckStatus::ok(format!("{backend} connected"))
    } else {
        CheckStatus::error(format!("{backend} connection failed"))
    }
}

/// Reports an open circuit as an error; half-open counts as recovering.
fn check_breakers(state: &AppState) -> BTreeMap<String, CheckStatus> {
    state
        .breakers
        .snapshot()
        .into_iter()
        .map(|(name, circuit)| {
            let check = match circuit {
                CircuitState::Open => CheckStatus::error(circuit.as_str()),
                CircuitState::Closed | CircuitState::HalfOpen => CheckStatus::ok(circuit.as_str()),
            };
            (name, check)
        })
        .collect()
}
