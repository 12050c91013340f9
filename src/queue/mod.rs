//! Frontier queue
//!
//! This module provides the durable work queue shared by all workers:
//! - The `Broker` trait: declare, publish, consume with prefetch, ack, recover
//! - `SqliteBroker`: the embedded SQLite-backed implementation
//! - `Consumer`: a pull-based message stream over a broker
//! - Seeding helpers used by the producer side

mod consumer;
mod schema;
mod sqlite;
mod traits;

pub use consumer::Consumer;
pub use sqlite::SqliteBroker;
pub use traits::{Broker, Delivery, DeliveryTag, QueueError, QueueResult, QueueStats};

use crate::url::filter_link;

/// Publishes seed URLs onto a queue, declaring it durable first
///
/// Seeds go through the same scheme checks as discovered links; rejected
/// seeds are logged and skipped. Returns the number of URLs published.
pub fn publish_seeds<S: AsRef<str>>(
    broker: &dyn Broker,
    queue: &str,
    seeds: &[S],
) -> QueueResult<usize> {
    broker.declare(queue, true)?;

    let mut published = 0;
    for seed in seeds {
        match filter_link(seed.as_ref()) {
            Ok(url) => {
                broker.publish(queue, url.as_bytes())?;
                tracing::info!("Seeded {}", url);
                published += 1;
            }
            Err(reason) => {
                tracing::warn!("Skipping seed {:?}: {}", seed.as_ref(), reason);
            }
        }
    }

    Ok(published)
}
