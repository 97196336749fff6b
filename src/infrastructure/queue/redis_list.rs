//! Reliable queue on top of a Redis list.
//!
//! Producers `LPUSH` JSON payloads onto `<queue>`. Consumers atomically move
//! messages into `<queue>:processing` with `RPOPLPUSH`, `LREM` them on
//! acknowledgement, and push them back onto the consuming end of `<queue>`
//! on release. Whatever is left in `<queue>:processing` at startup belongs to
//! a consumer that died mid-message and is moved back onto `<queue>`.

use super::source::{MessageSource, QueueError, QueueMessage, QueueResult};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between polls while the queue is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct RedisListQueue {
    client: ConnectionManager,
    queue: String,
    processing: String,
}

impl RedisListQueue {
    /// Connects to the broker at `redis_url` and binds to list `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unavailable`] if the connection or PING fails.
    pub async fn connect(redis_url: &str, queue: &str) -> QueueResult<Self> {
        info!("Connecting to Redis queue '{}'", queue);

        let client = Client::open(redis_url).map_err(|e| {
            QueueError::Unavailable(format!("Failed to create Redis client: {}", e))
        })?;
        let manager = ConnectionManager::new(client).await.map_err(|e| {
            QueueError::Unavailable(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| QueueError::Unavailable(format!("Redis PING failed: {}", e)))?;

        Ok(Self {
            client: manager,
            queue: queue.to_string(),
            processing: format!("{queue}:processing"),
        })
    }

    async fn claim_one(&self) -> QueueResult<Option<String>> {
        let mut conn = self.client.clone();
        redis::cmd("RPOPLPUSH")
            .arg(&self.queue)
            .arg(&self.processing)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Unavailable(format!("Redis RPOPLPUSH failed: {}", e)))
    }
}

#[async_trait]
impl MessageSource for RedisListQueue {
    async fn receive(&self, max_messages: usize, wait: Duration) -> QueueResult<Vec<QueueMessage>> {
        let deadline = Instant::now() + wait;
        let mut batch = Vec::new();

        loop {
            while batch.len() < max_messages {
                match self.claim_one().await? {
                    Some(body) => batch.push(QueueMessage::new(body)),
                    None => break,
                }
            }

            let now = Instant::now();
            if !batch.is_empty() || now >= deadline {
                debug!("Received {} message(s) from '{}'", batch.len(), self.queue);
                return Ok(batch);
            }

            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, message: &QueueMessage) -> QueueResult<()> {
        let mut conn = self.client.clone();
        conn.lrem::<_, _, ()>(&self.processing, 1, &message.body)
            .await
            .map_err(|e| QueueError::Unavailable(format!("Redis LREM failed: {}", e)))
    }

    async fn release(&self, message: &QueueMessage) -> QueueResult<()> {
        let mut conn = self.client.clone();
        redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(&message.body)
            .ignore()
            .cmd("RPUSH")
            .arg(&self.queue)
            .arg(&message.body)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::Unavailable(format!("Redis release failed: {}", e)))
    }

    async fn recover(&self) -> QueueResult<usize> {
        let mut conn = self.client.clone();
        let mut recovered = 0;

        loop {
            let moved: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(&self.processing)
                .arg(&self.queue)
                .query_async(&mut conn)
                .await
                .map_err(|e| QueueError::Unavailable(format!("Redis recovery failed: {}", e)))?;

            match moved {
                Some(_) => recovered += 1,
                None => break,
            }
        }

        if recovered > 0 {
            warn!(
                "Requeued {} message(s) left in '{}' by a previous consumer",
                recovered, self.processing
            );
        }
        Ok(recovered)
    }
}
