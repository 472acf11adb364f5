//! Order creation saga.
//!
//! ```text
//! validate ──► resolve products ──► persist ──► publish (best effort) ──► respond
//! ```
//!
//! Nothing is written until every product has been resolved, so a failed
//! lookup needs no compensation. The store commit and the publish are not
//! one transaction: if the publish fails the order exists but its inventory
//! is never decremented.

use std::time::Instant;

use common::{
    CreateOrderRequest, InvalidStatus, NewOrder, NewOrderItem, Order, OrderId, OrderStatus,
    ProductId, ValidationError,
};
use platform::{MessageBus, PlatformError};
use thiserror::Error;

use crate::client::{ProductCatalog, ProductLookupError};
use crate::publisher::OrderPublisher;
use crate::store::{OrderStore, StoreError};

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request is missing required fields.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A product could not be resolved; no order was written.
    #[error("{source}")]
    ProductLookup {
        product_id: ProductId,
        #[source]
        source: ProductLookupError,
    },

    /// The requested status is not one of the known statuses.
    #[error("{0}")]
    InvalidStatus(#[from] InvalidStatus),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SagaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SagaError::OrderNotFound(id),
            other => SagaError::Store(other),
        }
    }
}

/// Orchestrates order creation across the product service, the order store
/// and the message bus.
pub struct OrderSaga<S, P, B> {
    store: S,
    catalog: P,
    publisher: OrderPublisher<B>,
}

impl<S, P, B> OrderSaga<S, P, B>
where
    S: OrderStore,
    P: ProductCatalog,
    B: MessageBus,
{
    /// Creates the saga, declaring the `order.created` queue.
    pub async fn new(store: S, catalog: P, bus: B) -> Result<Self, PlatformError> {
        Ok(Self {
            store,
            catalog,
            publisher: OrderPublisher::new(bus).await?,
        })
    }

    /// Prices, persists and announces a new order.
    ///
    /// The total is fixed from the prices seen during this call and never
    /// recomputed.
    #[tracing::instrument(skip(self, req), fields(customer = %req.customer_name))]
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, SagaError> {
        let started = Instant::now();

        // 1. Validate
        let lines = req.validate()?;

        // 2. Resolve every product before writing anything
        let mut items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let product = self
                .catalog
                .get_product(product_id)
                .await
                .map_err(|source| {
                    tracing::warn!(%product_id, error = %source, "product lookup failed");
                    SagaError::ProductLookup { product_id, source }
                })?;
            items.push(NewOrderItem {
                product_id: product.id,
                product_name: product.name,
                quantity,
                price: product.price,
            });
        }

        // 3. Persist order and items atomically
        let new_order = NewOrder::pending(req.customer_name, items)?;
        let order = self.store.create(new_order).await?;
        metrics::counter!("orders_created_total").increment(1);

        // 4. Publish; a failure here does not fail the request
        match self.publisher.publish_order_created(&order).await {
            Ok(()) => {
                metrics::counter!("order_events_published_total").increment(1);
                tracing::info!(order_id = %order.id, "published order.created");
            }
            Err(e) => {
                metrics::counter!("order_event_publish_failures_total").increment(1);
                tracing::warn!(
                    order_id = %order.id,
                    error = %e,
                    "failed to publish order.created; inventory will not be reconciled"
                );
            }
        }

        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(order_id = %order.id, total = %order.total_amount, "order created");
        Ok(order)
    }

    /// Returns every order, newest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>, SagaError> {
        Ok(self.store.list().await?)
    }

    /// Returns one order with its items.
    pub async fn get_order(&self, id: OrderId) -> Result<Order, SagaError> {
        self.store
            .get(id)
            .await?
            .ok_or(SagaError::OrderNotFound(id))
    }

    /// Sets an order's status to one of the known statuses.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, status: &str) -> Result<OrderStatus, SagaError> {
        let status: OrderStatus = status.parse()?;
        self.store.update_status(id, status).await?;
        tracing::info!(order_id = %id, %status, "order status updated");
        Ok(status)
    }
}
