//! Shared state injected into every handler.

use std::sync::Arc;

use crate::application::circuit_breaker::CircuitBreakers;
use crate::application::services::PokemonService;
use crate::infrastructure::cache::ResultCache;

#[derive(Clone)]
pub struct AppState {
    pub pokemon_service: Arc<PokemonService>,
    pub cache: Arc<dyn ResultCache>,
    pub breakers: Arc<CircuitBreakers>,
}

impl AppState {
    pub fn new(
        pokemon_service: Arc<PokemonService>,
        cache: Arc<dyn ResultCache>,
        breakers: Arc<CircuitBreakers>,
    ) -> Self {
        Self {
            pokemon_service,
            cache,
            breakers,
        }
    }
}
