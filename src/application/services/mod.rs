//! Business logic services for the application layer.

pub mod pokemon_service;

pub use pokemon_service::{
    FETCH_BREAKER, LIST_BREAKER, PageOutcome, PokemonService, ServiceSettings, fallback_message,
};
