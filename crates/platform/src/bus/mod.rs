//! Durable queue client with manual acknowledgement.
//!
//! Delivery is at-least-once. A consumer must settle every [`Delivery`]
//! exactly once: `ack` removes it, `nack(true)` puts it back at the tail of
//! the queue, `nack(false)` drops it for good.

mod memory;
mod nats;

pub use memory::InMemoryMessageBus;
pub use nats::NatsMessageBus;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::Result;

/// A stream of deliveries from one queue.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

/// Settles one delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<()>;

    async fn nack(&self, requeue: bool) -> Result<()>;
}

/// One message handed to a consumer.
pub struct Delivery {
    payload: Vec<u8>,
    redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    /// The raw message body.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True if the broker has handed this message out before.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Removes the message from the queue.
    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }

    /// Rejects the message; with `requeue` it will be delivered again.
    pub async fn nack(self, requeue: bool) -> Result<()> {
        self.acker.nack(requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Durable named queues.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Creates the queue if it does not exist yet.
    async fn declare_queue(&self, queue: &str) -> Result<()>;

    /// Publishes a JSON message body to `queue`.
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()>;

    /// Starts consuming `queue` with manual acknowledgement.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream>;
}

#[async_trait]
impl<T: MessageBus + ?Sized> MessageBus for Arc<T> {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        (**self).declare_queue(queue).await
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        (**self).publish(queue, payload).await
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        (**self).consume(queue).await
    }
}
