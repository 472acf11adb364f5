use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{NewOrder, Order, OrderId, OrderItem, OrderStatus};
use tokio::sync::RwLock;

use super::{OrderStore, Result, StoreError};

#[derive(Default)]
struct StoreState {
    orders: BTreeMap<OrderId, Order>,
    next_order_id: i64,
    next_item_id: i64,
    fail_on_item_insert: Option<usize>,
    unavailable: bool,
}

/// In-memory order store for testing.
///
/// `create` stages the order and its items and only commits them if every
/// item insert succeeds, mirroring a rolled-back transaction.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create` fail when inserting the item at `index` (0-based).
    pub async fn fail_on_item_insert(&self, index: Option<usize>) {
        self.state.write().await.fail_on_item_insert = index;
    }

    /// Makes every call fail.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Number of committed order items across all orders.
    pub async fn item_count(&self) -> usize {
        self.state
            .read()
            .await
            .orders
            .values()
            .map(|o| o.items.len())
            .sum()
    }
}

fn check_available(state: &StoreState) -> Result<()> {
    if state.unavailable {
        return Err(StoreError::Unavailable("order store is unavailable".into()));
    }
    Ok(())
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        let id = OrderId::new(state.next_order_id + 1);
        let mut next_item_id = state.next_item_id;
        let mut items = Vec::with_capacity(order.items.len());

        for (index, item) in order.items.into_iter().enumerate() {
            if state.fail_on_item_insert == Some(index) {
                return Err(StoreError::Unavailable(format!(
                    "injected failure inserting item {index}"
                )));
            }
            next_item_id += 1;
            items.push(OrderItem {
                id: next_item_id,
                order_id: id,
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                price: item.price,
            });
        }

        let order = Order {
            id,
            customer_name: order.customer_name,
            total_amount: order.total_amount,
            status: order.status,
            items,
            created_at: Utc::now(),
        };

        // commit
        state.next_order_id = id.as_i64();
        state.next_item_id = next_item_id;
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.orders.values().rev().cloned().collect())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.orders.get(&id).cloned())
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut state = self.state.write().await;
        check_available(&state)?;
        let order = state.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.status = status;
        Ok(())
    }
}
