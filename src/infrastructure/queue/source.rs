//! Message source trait for the query consumer.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a message source.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// A message received from the queue.
///
/// The body doubles as the receipt used for acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
}

impl QueueMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// A pull-based queue with explicit acknowledgement.
///
/// Received messages stay invisible to other consumers until they are
/// acknowledged (removed for good) or released (made visible again).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Receives up to `max_messages`, waiting at most `wait` for the first one.
    ///
    /// Returns an empty batch when nothing arrived within `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unavailable`] if the broker cannot be reached.
    async fn receive(&self, max_messages: usize, wait: Duration) -> QueueResult<Vec<QueueMessage>>;

    /// Permanently removes a processed message.
    async fn ack(&self, message: &QueueMessage) -> QueueResult<()>;

    /// Returns an unprocessed message to the queue for redelivery.
    async fn release(&self, message: &QueueMessage) -> QueueResult<()>;

    /// Makes every message still claimed by a previous consumer visible again.
    ///
    /// Called once before consumption starts so that messages claimed by a
    /// process that died before settling them are redelivered. Returns the
    /// number of messages recovered.
    async fn recover(&self) -> QueueResult<usize>;
}
