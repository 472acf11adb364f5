//! Order persistence.
//!
//! An order and its items are written in one atomic step; there is never
//! an order row without its items or the reverse. Orders are never deleted.

mod memory;
mod postgres;

pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

use std::sync::Arc;

use async_trait::async_trait;
use common::{NewOrder, Order, OrderId, OrderStatus};
use thiserror::Error;

/// Errors raised by an [`OrderStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order row has the given id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// A database error occurred. Any open transaction was rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to an order.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order and all of its items atomically.
    async fn create(&self, order: NewOrder) -> Result<Order>;

    /// Returns every order with its items, newest first.
    async fn list(&self) -> Result<Vec<Order>>;

    /// Returns an order with its items, or `None` if the id is unknown.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Overwrites an order's status. Fails with [`StoreError::NotFound`].
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn create(&self, order: NewOrder) -> Result<Order> {
        (**self).create(order).await
    }

    async fn list(&self) -> Result<Vec<Order>> {
        (**self).list().await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        (**self).get(id).await
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        (**self).update_status(id, status).await
    }
}
