#![allow(dead_code)]

use axum::{Router, routing::get};
use mockito::{Matcher, Mock, ServerGuard};
use pokemon_gateway::api::handlers::health_handler;
use pokemon_gateway::api::routes::pokemon_routes;
use pokemon_gateway::application::circuit_breaker::{CircuitBreakerConfig, CircuitBreakers};
use pokemon_gateway::application::services::{PokemonService, ServiceSettings};
use pokemon_gateway::infrastructure::cache::{MemoryCache, ResultCache};
use pokemon_gateway::infrastructure::http::PokeApiClient;
use pokemon_gateway::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Collection path served by the mock upstream.
pub const COLLECTION_PATH: &str = "/api/v2/pokemon";

/// Reference URL as PokeAPI returns it; segment 6 carries the id.
pub fn reference_url(id: i64) -> String {
    format!("https://pokeapi.co/api/v2/pokemon/{id}/")
}

pub fn list_body(ids: &[i64]) -> String {
    let results: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({ "name": format!("pokemon-{id}"), "url": reference_url(*id) }))
        .collect();

    serde_json::json!({
        "count": 1302,
        "next": null,
        "previous": null,
        "results": results,
    })
    .to_string()
}

pub fn pokemon_body(id: i64) -> String {
    serde_json::json!({
        "id": id,
        "name": format!("pokemon-{id}"),
        "weight": 10 * id,
        "height": id,
        "base_experience": 64,
        "location_area_encounters": format!("https://pokeapi.co/api/v2/pokemon/{id}/encounters"),
        "abilities": [],
        "is_default": true,
    })
    .to_string()
}

pub async fn mock_list(server: &mut ServerGuard, limit: u32, ids: &[i64]) -> Mock {
    server
        .mock("GET", COLLECTION_PATH)
        .match_query(Matcher::UrlEncoded("limit".into(), limit.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(list_body(ids))
        .create_async()
        .await
}

pub async fn mock_detail(server: &mut ServerGuard, id: i64) -> Mock {
    server
        .mock("GET", format!("{COLLECTION_PATH}/{id}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(pokemon_body(id))
        .create_async()
        .await
}

/// Builds state wired to the mock upstream and a fresh in-memory cache.
pub fn create_test_state(upstream: &ServerGuard) -> (AppState, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::default());
    let state = create_test_state_with_cache(upstream, cache.clone());
    (state, cache)
}

pub fn create_test_state_with_cache(
    upstream: &ServerGuard,
    cache: Arc<dyn ResultCache>,
) -> AppState {
    let client = Arc::new(
        PokeApiClient::connect(
            &format!("{}{COLLECTION_PATH}", upstream.url()),
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let breakers = Arc::new(CircuitBreakers::new(CircuitBreakerConfig::default()));
    let service = Arc::new(PokemonService::new(
        client.clone(),
        client,
        cache.clone(),
        &breakers,
        ServiceSettings::default(),
    ));

    AppState::new(service, cache, breakers)
}

/// Application routes without the peer-address rate limiter.
pub fn test_router(state: AppState) -> Router {
    pokemon_routes()
        .route("/health", get(health_handler))
        .with_state(state)
}
