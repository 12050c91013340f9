//! Pull-based consumption of a queue
//!
//! A `Consumer` turns the broker's non-blocking `try_consume` into a message
//! stream that suspends until work arrives or shutdown is signaled.

use crate::queue::traits::{Broker, Delivery, DeliveryTag, QueueResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// One named consumer attached to a queue
///
/// Dropping the consumer returns its unacknowledged deliveries to the queue,
/// so a worker that exits or fails mid-task never strands its message.
pub struct Consumer {
    broker: Arc<dyn Broker>,
    queue: String,
    tag: String,
    prefetch: u32,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: impl Into<String>,
        tag: impl Into<String>,
        prefetch: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            tag: tag.into(),
            prefetch,
            poll_interval,
        }
    }

    /// Consumer tag as seen by the broker
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Waits for the next delivery
    ///
    /// Returns `Ok(None)` once `shutdown` carries `true` or its sender is
    /// gone. The poll interval picks up messages published by other
    /// processes, which do not fire the in-process notifier.
    pub async fn next(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> QueueResult<Option<Delivery>> {
        let notify = self.broker.notifier();

        loop {
            // Register interest before checking, so a publish in between is not missed
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if *shutdown.borrow() {
                return Ok(None);
            }

            if let Some(delivery) = self
                .broker
                .try_consume(&self.queue, &self.tag, self.prefetch)?
            {
                return Ok(Some(delivery));
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    pub fn ack(&self, tag: DeliveryTag) -> QueueResult<()> {
        self.broker.ack(&self.tag, tag)
    }

    /// Republishes a message on this consumer's queue
    pub fn publish(&self, body: &[u8]) -> QueueResult<()> {
        self.broker.publish(&self.queue, body)
    }

    /// Number of deliveries this consumer holds without an ack
    pub fn unacked(&self) -> QueueResult<u64> {
        self.broker.unacked_by(&self.tag)
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        match self.broker.recover(&self.tag) {
            Ok(0) => {}
            Ok(count) => tracing::warn!(
                "Consumer {} dropped with {} unacknowledged deliveries; requeued",
                self.tag,
                count
            ),
            Err(e) => tracing::error!("Failed to requeue deliveries of {}: {}", self.tag, e),
        }
    }
}
