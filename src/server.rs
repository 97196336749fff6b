//! HTTP server initialization and runtime setup.
//!
//! Handles cache setup, upstream client construction, query consumer
//! spawning, and Axum server lifecycle.

use crate::application::circuit_breaker::CircuitBreakers;
use crate::application::query_worker::spawn_query_workers;
use crate::application::services::PokemonService;
use crate::config::Config;
use crate::infrastructure::cache::{MemoryCache, RedisCache, ResultCache};
use crate::infrastructure::http::PokeApiClient;
use crate::infrastructure::queue::{MessageSource, RedisListQueue};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Redis cache (or in-memory fallback)
/// - PokeAPI client and circuit breakers
/// - Query consumer workers (when `QUEUE_URL` is set)
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - The upstream base URL is invalid
/// - The configured query queue cannot be reached
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let cache = connect_cache(&config).await;

    let client = Arc::new(
        PokeApiClient::connect(
            &config.upstream_base_url,
            Duration::from_secs(config.upstream_timeout_seconds),
        )
        .context("Failed to build upstream client")?,
    );

    let breakers = Arc::new(CircuitBreakers::new(config.circuit_breaker_config()));
    let pokemon_service = Arc::new(PokemonService::new(
        client.clone(),
        client,
        cache.clone(),
        &breakers,
        config.service_settings(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = start_query_consumer(&config, pokemon_service.clone(), shutdown_rx).await?;

    let state = AppState::new(pokemon_service, cache, breakers);
    let app = app_router(state, config.behind_proxy);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!("Query worker terminated abnormally: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn connect_cache(config: &Config) -> Arc<dyn ResultCache> {
    let memory = || -> Arc<dyn ResultCache> {
        Arc::new(MemoryCache::new(config.memory_cache_capacity))
    };

    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Cache: in-memory (Redis not configured)");
        return memory();
    };

    match RedisCache::connect(redis_url).await {
        Ok(redis) => {
            tracing::info!("Cache enabled (Redis)");
            Arc::new(redis)
        }
        Err(e) => {
            tracing::warn!("Failed to connect to Redis: {}. Using in-memory cache.", e);
            memory()
        }
    }
}

async fn start_query_consumer(
    config: &Config,
    service: Arc<PokemonService>,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<()>>> {
    let (Some(queue), Some(broker)) = (&config.queue_url, config.queue_broker_url()) else {
        tracing::info!("Query consumer disabled");
        return Ok(Vec::new());
    };

    let source: Arc<dyn MessageSource> = Arc::new(
        RedisListQueue::connect(broker, queue)
            .await
            .with_context(|| format!("Failed to connect to query queue '{queue}'"))?,
    );

    let settings = config.worker_settings();
    tracing::info!("Query consumer started ({} worker(s))", settings.workers);

    Ok(spawn_query_workers(source, service, settings, shutdown).await)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
