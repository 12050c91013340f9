//! Broker trait and error types
//!
//! This module defines the interface the workers need from a durable work
//! queue, independent of the backend that provides it.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Queue not declared: {0}")]
    UnknownQueue(String),

    #[error("Unknown or already acknowledged delivery tag: {0}")]
    UnknownDeliveryTag(DeliveryTag),

    #[error("Message body is not valid UTF-8: {0}")]
    InvalidBody(#[from] std::str::Utf8Error),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Handle used to acknowledge one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryTag(pub i64);

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message handed to one consumer and awaiting acknowledgement
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub body: Vec<u8>,
    /// Set when an earlier consumer received this message and never acked it
    pub redelivered: bool,
}

impl Delivery {
    /// Decodes the body as a URL task
    pub fn url(&self) -> QueueResult<&str> {
        Ok(std::str::from_utf8(&self.body)?.trim())
    }
}

/// Message counts for a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages waiting for a consumer
    pub ready: u64,
    /// Messages delivered but not yet acknowledged
    pub unacked: u64,
}

impl QueueStats {
    /// No message is waiting and none is being processed
    pub fn is_drained(&self) -> bool {
        self.ready == 0 && self.unacked == 0
    }
}

/// Durable at-least-once work queue
///
/// Implementations must be safe to share between workers. A message is
/// delivered to at most one consumer at a time and stays owned by it until
/// acknowledged or recovered.
pub trait Broker: Send + Sync {
    /// Creates the queue if it does not exist yet
    fn declare(&self, queue: &str, durable: bool) -> QueueResult<()>;

    /// Appends a message at the tail of the queue
    fn publish(&self, queue: &str, body: &[u8]) -> QueueResult<()>;

    /// Hands the oldest ready message to `consumer`
    ///
    /// Returns `None` when the queue is empty or when `consumer` already
    /// holds `prefetch` unacknowledged messages (fair dispatch).
    fn try_consume(
        &self,
        queue: &str,
        consumer: &str,
        prefetch: u32,
    ) -> QueueResult<Option<Delivery>>;

    /// Removes a message delivered to `consumer` for good
    ///
    /// Fails with `UnknownDeliveryTag` when `consumer` no longer owns the
    /// message, e.g. after it was recovered and handed to someone else.
    fn ack(&self, consumer: &str, tag: DeliveryTag) -> QueueResult<()>;

    /// Returns every unacknowledged message of `consumer` to the ready state
    fn recover(&self, consumer: &str) -> QueueResult<u64>;

    /// Returns every unacknowledged message of `queue` to the ready state
    fn recover_all(&self, queue: &str) -> QueueResult<u64>;

    /// Number of unacknowledged messages held by `consumer`
    fn unacked_by(&self, consumer: &str) -> QueueResult<u64>;

    fn stats(&self, queue: &str) -> QueueResult<QueueStats>;

    /// Drops every non-durable queue and its messages; returns the message count
    fn purge_transient(&self) -> QueueResult<u64>;

    /// Signal fired on every publish and ack, for consumers waiting on work
    fn notifier(&self) -> Arc<Notify>;
}
