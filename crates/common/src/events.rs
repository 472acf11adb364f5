//! The `order.created` message.

use serde::{Deserialize, Serialize};

use crate::{Money, Order, OrderId, ProductId};

/// Durable queue carrying [`OrderCreatedEvent`] payloads.
pub const ORDER_CREATED_QUEUE: &str = "order.created";

/// Inventory delta for one line of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemEvent {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Published once per committed order, consumed at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub customer_name: String,
    pub total_amount: Money,
    pub items: Vec<OrderItemEvent>,
}

/// A payload that cannot be turned into an [`OrderCreatedEvent`].
///
/// Never retryable: the same bytes will fail the same way on redelivery.
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("malformed order.created payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("order.created event has no items")]
    NoItems,

    #[error("order.created item for product {product_id} has non-positive quantity {quantity}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },
}

impl OrderCreatedEvent {
    /// Projects a committed order onto its event.
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            customer_name: order.customer_name.clone(),
            total_amount: order.total_amount,
            items: order
                .items
                .iter()
                .map(|item| OrderItemEvent {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }

    /// Decodes and validates a message body.
    pub fn decode(payload: &[u8]) -> Result<Self, EventDecodeError> {
        let event: OrderCreatedEvent = serde_json::from_slice(payload)?;
        if event.items.is_empty() {
            return Err(EventDecodeError::NoItems);
        }
        if let Some(bad) = event.items.iter().find(|item| item.quantity <= 0) {
            return Err(EventDecodeError::InvalidQuantity {
                product_id: bad.product_id,
                quantity: bad.quantity,
            });
        }
        Ok(event)
    }

    /// Encodes the event as a JSON message body.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
