//! Message queue integration for the query consumer.
//!
//! Provides a [`MessageSource`] trait with a Redis list implementation,
//! [`RedisListQueue`].

mod redis_list;
mod source;

pub use redis_list::RedisListQueue;
pub use source::{MessageSource, QueueError, QueueMessage, QueueResult};

#[cfg(test)]
pub use source::MockMessageSource;
