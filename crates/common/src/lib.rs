//! Shared models for the order fulfillment services.
//!
//! Everything in here crosses a process boundary at some point: HTTP bodies
//! between the gateway, product service and order service, the
//! `order.created` message payload, and cache values.

pub mod events;
pub mod health;
pub mod money;
pub mod order;
pub mod product;
pub mod registration;
pub mod types;

pub use events::{EventDecodeError, ORDER_CREATED_QUEUE, OrderCreatedEvent, OrderItemEvent};
pub use health::HealthResponse;
pub use money::Money;
pub use order::{
    CreateOrderItemRequest, CreateOrderRequest, InvalidStatus, NewOrder, NewOrderItem, Order,
    OrderItem, OrderStatus, UpdateStatusRequest,
};
pub use product::{ALL_PRODUCTS_CACHE_KEY, CreateProductRequest, Product};
pub use registration::{HealthCheckSpec, ServiceAddress, ServiceRegistration};
pub use types::{OrderId, ProductId};

/// Error raised when a request body is missing a required field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
