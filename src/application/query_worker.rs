//! Background consumer resolving queued Pokemon queries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

use crate::application::services::{PokemonService, fallback_message};
use crate::domain::pokemon_query::PokemonQuery;
use crate::infrastructure::queue::{MessageSource, QueueMessage, QueueResult};

/// Polling parameters of the query consumer.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Long-poll duration of a single receive.
    pub wait_time: Duration,
    /// Batch size of a single receive.
    pub max_messages: usize,
    /// Window, opened at receipt, within which a batch must be settled.
    pub visibility_timeout: Duration,
    /// Number of concurrent consumer loops.
    pub workers: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(20),
            max_messages: 10,
            visibility_timeout: Duration::from_secs(30),
            workers: 1,
        }
    }
}

/// Requeues messages stranded by a previous process, then spawns
/// `settings.workers` consumer loops sharing one source.
///
/// Each loop stops once `shutdown` flips to `true` or its sender is dropped.
/// A failed recovery is logged and consumption starts regardless.
pub async fn spawn_query_workers(
    source: Arc<dyn MessageSource>,
    service: Arc<PokemonService>,
    settings: WorkerSettings,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    match source.recover().await {
        Ok(0) => {}
        Ok(recovered) => info!(recovered, "Recovered unsettled queue messages"),
        Err(e) => warn!(error = %e, "Failed to recover unsettled queue messages"),
    }

    (0..settings.workers.max(1))
        .map(|worker_id| {
            tokio::spawn(run_query_worker(
                worker_id,
                source.clone(),
                service.clone(),
                settings.clone(),
                shutdown.clone(),
            ))
        })
        .collect()
}

pub async fn run_query_worker(
    worker_id: usize,
    source: Arc<dyn MessageSource>,
    service: Arc<PokemonService>,
    settings: WorkerSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(worker_id, "Query worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = receive_with_retry(source.as_ref(), &settings) => received,
        };

        match received {
            Ok(messages) => {
                process_batch(&service, source.as_ref(), &messages, settings.visibility_timeout)
                    .await;
            }
            Err(e) => {
                error!(worker_id, error = %e, "Giving up on queue receive, backing off");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(settings.wait_time) => {}
                }
            }
        }
    }

    info!(worker_id, "Query worker stopped");
}

/// Handles a received batch within one visibility window.
///
/// The window starts at receipt and is shared by the whole batch: each
/// message gets what is left of it, and messages reached after it closed
/// are released untouched.
async fn process_batch(
    service: &PokemonService,
    source: &dyn MessageSource,
    messages: &[QueueMessage],
    visibility_timeout: Duration,
) {
    let deadline = Instant::now() + visibility_timeout;

    for message in messages {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            metrics::counter!("queue_messages_total", "result" => "released").increment(1);
            debug!(body = %message.body, "Visibility window closed before processing, releasing");
            settle(source.release(message).await, "release");
            continue;
        }

        handle_message(service, source, message, remaining).await;
    }
}

async fn receive_with_retry(
    source: &dyn MessageSource,
    settings: &WorkerSettings,
) -> QueueResult<Vec<QueueMessage>> {
    // 200ms, 400ms, 800ms, ... capped at 5s
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(5);

    Retry::spawn(strategy, || async {
        source
            .receive(settings.max_messages, settings.wait_time)
            .await
            .inspect_err(|e| warn!(error = %e, "Queue receive failed"))
    })
    .await
}

/// Processes one message and settles it with the source.
///
/// Malformed payloads are acknowledged and dropped. Upstream failures are
/// logged and the message is acknowledged. Processing that outlives
/// `budget` is abandoned and the message released.
pub async fn handle_message(
    service: &PokemonService,
    source: &dyn MessageSource,
    message: &QueueMessage,
    budget: Duration,
) {
    let query = match PokemonQuery::parse(&message.body) {
        Ok(query) => query,
        Err(e) => {
            warn!(error = %e, body = %message.body, "Dropping malformed query message");
            settle(source.ack(message).await, "ack");
            return;
        }
    };

    debug!(url = %query.url, "Processing pokemon query");

    let reference = query.reference();
    match tokio::time::timeout(budget, service.fetch_by_reference(&reference)).await {
        Ok(Ok(pokemon)) => {
            metrics::counter!("queue_messages_total", "result" => "resolved").increment(1);
            info!(id = pokemon.id, name = %pokemon.name, url = %query.url, "Resolved queued query");
        }
        Ok(Err(cause)) => {
            metrics::counter!("queue_messages_total", "result" => "failed").increment(1);
            warn!(url = %query.url, "{}", fallback_message(&cause));
        }
        Err(_) => {
            metrics::counter!("queue_messages_total", "result" => "released").increment(1);
            warn!(url = %query.url, "Query exceeded visibility timeout, releasing");
            settle(source.release(message).await, "release");
            return;
        }
    }

    settle(source.ack(message).await, "ack");
}

fn settle(result: QueueResult<()>, action: &str) {
    if let Err(e) = result {
        error!(error = %e, "Failed to {} queue message", action);
    }
}
