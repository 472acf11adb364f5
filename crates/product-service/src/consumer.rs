//! Inventory reconciliation from `order.created` messages.
//!
//! Each message moves through:
//!
//! ```text
//! received ──► parsed ──► applying ──┬──► acked
//!    │                               └──► requeued (any item failed)
//!    └──► discarded (undecodable)
//! ```
//!
//! Decrements are not idempotent. A requeued message is reapplied in full,
//! so items that succeeded on an earlier attempt are decremented again.

use std::future::Future;

use common::{ALL_PRODUCTS_CACHE_KEY, EventDecodeError, OrderCreatedEvent, OrderId, ProductId};
use futures_util::StreamExt;
use platform::{Cache, Delivery, DeliveryStream};
use thiserror::Error;

use crate::store::ProductStore;

/// Why a message was not applied cleanly.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The payload is not a valid event. Never retried.
    #[error("Failed to decode message: {0}")]
    Decode(#[from] EventDecodeError),

    /// At least one decrement failed. The whole message is retried.
    #[error("Failed to apply order {order_id}: {failed} of {total} items failed")]
    Apply {
        order_id: OrderId,
        failed: usize,
        total: usize,
    },
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Applied and removed from the queue.
    Acked,
    /// Rejected without requeue; the message is gone.
    Discarded,
    /// Rejected with requeue; the message will be delivered again.
    Requeued,
}

/// Why [`InventoryConsumer::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// The shutdown signal fired.
    Shutdown,
    /// The broker closed the delivery stream; no more messages will arrive.
    StreamClosed,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOutcome::Acked => "acked",
            MessageOutcome::Discarded => "discarded",
            MessageOutcome::Requeued => "requeued",
        }
    }
}

impl std::fmt::Display for MessageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Applies order events to product quantities, one message at a time.
pub struct InventoryConsumer<S, C> {
    store: S,
    cache: C,
}

impl<S: ProductStore, C: Cache> InventoryConsumer<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    /// Decodes a payload and decrements every item's quantity.
    ///
    /// Both cache keys of every item are invalidated whether or not its
    /// decrement succeeded.
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<OrderCreatedEvent, ConsumerError> {
        let event = OrderCreatedEvent::decode(payload)?;
        tracing::info!(
            order_id = %event.order_id,
            customer = %event.customer_name,
            items = event.items.len(),
            "processing order.created"
        );

        let mut failed = 0;
        for item in &event.items {
            match self
                .store
                .adjust_quantity(item.product_id, -item.quantity)
                .await
            {
                Ok(product) => tracing::info!(
                    product_id = %item.product_id,
                    decrement = item.quantity,
                    quantity = product.quantity,
                    "inventory reduced"
                ),
                Err(e) => {
                    failed += 1;
                    metrics::counter!("inventory_decrement_failures_total").increment(1);
                    tracing::warn!(
                        product_id = %item.product_id,
                        error = %e,
                        "failed to reduce inventory"
                    );
                }
            }
            self.invalidate(item.product_id).await;
        }

        if failed > 0 {
            return Err(ConsumerError::Apply {
                order_id: event.order_id,
                failed,
                total: event.items.len(),
            });
        }
        Ok(event)
    }

    /// Handles one delivery and settles it with the broker.
    #[tracing::instrument(skip(self, delivery), fields(redelivered = delivery.redelivered()))]
    pub async fn process(&self, delivery: Delivery) -> MessageOutcome {
        let (outcome, settled) = match self.handle_payload(delivery.payload()).await {
            Ok(event) => {
                tracing::info!(order_id = %event.order_id, "order processed");
                (MessageOutcome::Acked, delivery.ack().await)
            }
            Err(e @ ConsumerError::Decode(_)) => {
                tracing::error!(error = %e, "discarding undecodable message");
                (MessageOutcome::Discarded, delivery.nack(false).await)
            }
            Err(e @ ConsumerError::Apply { .. }) => {
                tracing::warn!(error = %e, "order partially applied, requeueing");
                (MessageOutcome::Requeued, delivery.nack(true).await)
            }
        };

        if let Err(e) = settled {
            tracing::error!(outcome = %outcome, error = %e, "failed to settle message");
        }
        metrics::counter!("inventory_messages_total", "outcome" => outcome.as_str()).increment(1);
        outcome
    }

    /// Consumes until `shutdown` resolves or the stream ends.
    ///
    /// A message already being processed is finished and settled before the
    /// shutdown signal is observed. Callers should treat
    /// [`ConsumerExit::StreamClosed`] as fatal.
    pub async fn run(
        &self,
        mut deliveries: DeliveryStream,
        shutdown: impl Future<Output = ()>,
    ) -> ConsumerExit {
        tokio::pin!(shutdown);
        tracing::info!("inventory consumer started");

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("inventory consumer stopping");
                    return ConsumerExit::Shutdown;
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        self.process(delivery).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "failed to receive message");
                    }
                    None => {
                        metrics::counter!("inventory_consumer_stream_closed_total").increment(1);
                        tracing::error!("delivery stream closed; inventory is no longer reconciled");
                        return ConsumerExit::StreamClosed;
                    }
                },
            }
        }
    }

    async fn invalidate(&self, product_id: ProductId) {
        let product_key = product_id.cache_key();
        for key in [product_key.as_str(), ALL_PRODUCTS_CACHE_KEY] {
            if let Err(e) = self.cache.delete(key).await {
                metrics::counter!("cache_errors_total").increment(1);
                tracing::warn!(key, error = %e, "failed to invalidate cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryProductStore, NewProduct};
    use common::{Money, ORDER_CREATED_QUEUE, OrderItemEvent, Product};
    use platform::{CacheExt, InMemoryCache, InMemoryMessageBus, MessageBus};
    use std::time::Duration;

    struct Fixture {
        store: InMemoryProductStore,
        cache: InMemoryCache,
        bus: InMemoryMessageBus,
        consumer: InventoryConsumer<InMemoryProductStore, InMemoryCache>,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryProductStore::new();
        let cache = InMemoryCache::new();
        let bus = InMemoryMessageBus::new();
        bus.declare_queue(ORDER_CREATED_QUEUE).await.unwrap();
        let consumer = InventoryConsumer::new(store.clone(), cache.clone());
        Fixture {
            store,
            cache,
            bus,
            consumer,
        }
    }

    async fn product(store: &InMemoryProductStore, qty: i32) -> Product {
        store
            .create(NewProduct::new("Item", Money::from_cents(1000), qty))
            .await
            .unwrap()
    }

    fn event(items: &[(ProductId, i32)]) -> Vec<u8> {
        OrderCreatedEvent {
            order_id: OrderId::new(1),
            customer_name: "Ada".into(),
            total_amount: Money::from_cents(2500),
            items: items
                .iter()
                .map(|&(product_id, quantity)| OrderItemEvent {
                    product_id,
                    quantity,
                })
                .collect(),
        }
        .encode()
        .unwrap()
    }

    async fn next_delivery(bus: &InMemoryMessageBus) -> Delivery {
        let mut stream = bus.consume(ORDER_CREATED_QUEUE).await.unwrap();
        stream.next().await.unwrap().unwrap()
    }

    async fn quantity(store: &InMemoryProductStore, id: ProductId) -> i32 {
        store.get(id).await.unwrap().unwrap().quantity
    }

    #[tokio::test]
    async fn applies_all_items_and_acks() {
        let f = fixture().await;
        let p1 = product(&f.store, 10).await;
        let p2 = product(&f.store, 10).await;
        f.cache
            .set_json(&p1.id.cache_key(), &p1, Duration::from_secs(60))
            .await
            .unwrap();
        f.cache
            .set_json(ALL_PRODUCTS_CACHE_KEY, &vec![p1.clone()], Duration::from_secs(60))
            .await
            .unwrap();

        f.bus
            .publish(ORDER_CREATED_QUEUE, event(&[(p1.id, 2), (p2.id, 1)]))
            .await
            .unwrap();
        let outcome = f.consumer.process(next_delivery(&f.bus).await).await;

        assert_eq!(outcome, MessageOutcome::Acked);
        assert_eq!(quantity(&f.store, p1.id).await, 8);
        assert_eq!(quantity(&f.store, p2.id).await, 9);
        assert!(!f.cache.contains(&p1.id.cache_key()).await);
        assert!(!f.cache.contains(ALL_PRODUCTS_CACHE_KEY).await);
        assert_eq!(f.bus.acked_count(ORDER_CREATED_QUEUE).await, 1);
    }

    #[tokio::test]
    async fn malformed_message_is_discarded_after_one_attempt() {
        let f = fixture().await;
        f.bus
            .publish(ORDER_CREATED_QUEUE, b"{not json".to_vec())
            .await
            .unwrap();

        let outcome = f.consumer.process(next_delivery(&f.bus).await).await;

        assert_eq!(outcome, MessageOutcome::Discarded);
        assert_eq!(f.bus.ready_count(ORDER_CREATED_QUEUE).await, 0);
        assert_eq!(
            f.bus.discarded(ORDER_CREATED_QUEUE).await,
            vec![b"{not json".to_vec()]
        );
    }

    #[tokio::test]
    async fn event_without_items_is_discarded() {
        let f = fixture().await;
        f.bus
            .publish(ORDER_CREATED_QUEUE, event(&[]))
            .await
            .unwrap();

        let outcome = f.consumer.process(next_delivery(&f.bus).await).await;
        assert_eq!(outcome, MessageOutcome::Discarded);
    }

    #[tokio::test]
    async fn partial_failure_requeues_and_redelivery_double_applies() {
        let f = fixture().await;
        let p1 = product(&f.store, 10).await;
        let p2 = product(&f.store, 10).await;
        f.store.fail_adjustments(p2.id, 1).await;

        f.bus
            .publish(ORDER_CREATED_QUEUE, event(&[(p1.id, 2), (p2.id, 1)]))
            .await
            .unwrap();
        let mut stream = f.bus.consume(ORDER_CREATED_QUEUE).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(f.consumer.process(first).await, MessageOutcome::Requeued);
        assert_eq!(quantity(&f.store, p1.id).await, 8);
        assert_eq!(quantity(&f.store, p2.id).await, 10);

        let second = stream.next().await.unwrap().unwrap();
        assert!(second.redelivered());
        assert_eq!(f.consumer.process(second).await, MessageOutcome::Acked);

        // p1 decremented twice, p2 once
        assert_eq!(quantity(&f.store, p1.id).await, 6);
        assert_eq!(quantity(&f.store, p2.id).await, 9);
    }

    #[tokio::test]
    async fn failed_item_still_invalidates_cache() {
        let f = fixture().await;
        let p = product(&f.store, 10).await;
        f.store.fail_adjustments(p.id, 1).await;
        f.cache
            .set_json(&p.id.cache_key(), &p, Duration::from_secs(60))
            .await
            .unwrap();

        let result = f.consumer.handle_payload(&event(&[(p.id, 1)])).await;

        assert!(matches!(
            result,
            Err(ConsumerError::Apply {
                failed: 1,
                total: 1,
                ..
            })
        ));
        assert!(!f.cache.contains(&p.id.cache_key()).await);
    }

    #[tokio::test]
    async fn unknown_product_requeues() {
        let f = fixture().await;
        let result = f
            .consumer
            .handle_payload(&event(&[(ProductId::new(404), 1)]))
            .await;
        assert!(matches!(result, Err(ConsumerError::Apply { .. })));
    }

    #[tokio::test]
    async fn cache_outage_does_not_block_decrement() {
        let f = fixture().await;
        let p = product(&f.store, 3).await;
        f.cache.set_unavailable(true);

        f.consumer
            .handle_payload(&event(&[(p.id, 3)]))
            .await
            .unwrap();
        assert_eq!(quantity(&f.store, p.id).await, 0);
    }

    #[tokio::test]
    async fn run_processes_in_order_and_stops_on_shutdown() {
        let f = fixture().await;
        let p = product(&f.store, 10).await;
        for qty in [1, 2, 3] {
            f.bus
                .publish(ORDER_CREATED_QUEUE, event(&[(p.id, qty)]))
                .await
                .unwrap();
        }

        let deliveries = f.bus.consume(ORDER_CREATED_QUEUE).await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let bus = f.bus.clone();
        let consumer = f.consumer;

        let handle = tokio::spawn(async move {
            consumer
                .run(deliveries, async {
                    let _ = rx.await;
                })
                .await
        });

        while bus.acked_count(ORDER_CREATED_QUEUE).await < 3 {
            tokio::task::yield_now().await;
        }
        tx.send(()).unwrap();

        assert_eq!(handle.await.unwrap(), ConsumerExit::Shutdown);
        assert_eq!(quantity(&f.store, p.id).await, 4);
    }

    #[tokio::test]
    async fn run_reports_closed_stream() {
        let f = fixture().await;
        let deliveries: DeliveryStream = Box::pin(futures_util::stream::empty());

        let exit = f
            .consumer
            .run(deliveries, std::future::pending::<()>())
            .await;

        assert_eq!(exit, ConsumerExit::StreamClosed);
    }

    #[test]
    fn outcome_names() {
        assert_eq!(MessageOutcome::Acked.to_string(), "acked");
        assert_eq!(MessageOutcome::Discarded.as_str(), "discarded");
        assert_eq!(MessageOutcome::Requeued.as_str(), "requeued");
    }
}
