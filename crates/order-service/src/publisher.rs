//! Publishes `order.created` after an order commits.

use common::{ORDER_CREATED_QUEUE, Order, OrderCreatedEvent};
use platform::{MessageBus, PlatformError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to publish event: {0}")]
    Bus(#[from] PlatformError),
}

/// Producer for the `order.created` queue.
pub struct OrderPublisher<B> {
    bus: B,
}

impl<B: MessageBus> OrderPublisher<B> {
    /// Declares the queue and returns a publisher bound to it.
    pub async fn new(bus: B) -> Result<Self, PlatformError> {
        bus.declare_queue(ORDER_CREATED_QUEUE).await?;
        Ok(Self { bus })
    }

    /// Publishes the event projection of a committed order.
    pub async fn publish_order_created(&self, order: &Order) -> Result<(), PublishError> {
        let payload = OrderCreatedEvent::from_order(order).encode()?;
        self.bus.publish(ORDER_CREATED_QUEUE, payload).await?;
        Ok(())
    }
}
