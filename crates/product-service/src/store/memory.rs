use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, Product, ProductId};
use tokio::sync::RwLock;

use super::{NewProduct, ProductStore, Result, StoreError};

#[derive(Default)]
struct StoreState {
    products: BTreeMap<ProductId, Product>,
    next_id: i64,
    /// Remaining injected failures per product for `adjust_quantity`.
    adjust_failures: HashMap<ProductId, u32>,
    unavailable: bool,
}

/// In-memory product store for testing.
///
/// Ids are assigned sequentially from 1. Failures can be injected per
/// product for quantity adjustments, or globally for every call.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryProductStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` adjustments of `id` fail.
    pub async fn fail_adjustments(&self, id: ProductId, times: u32) {
        self.state.write().await.adjust_failures.insert(id, times);
    }

    /// Makes every call fail.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Overwrites a product's price in place, bypassing any cache.
    pub async fn set_price(&self, id: ProductId, price: Money) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state.products.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        product.price = price;
        Ok(())
    }

    /// Number of stored products.
    pub async fn len(&self) -> usize {
        self.state.read().await.products.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn check_available(state: &StoreState) -> Result<()> {
    if state.unavailable {
        return Err(StoreError::Unavailable("product store is unavailable".into()));
    }
    Ok(())
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn list(&self) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.products.values().cloned().collect())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.products.get(&id).cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        state.next_id += 1;
        let product = Product {
            id: ProductId::new(state.next_id),
            name: product.name,
            price: product.price,
            quantity: product.quantity,
            created_at: Utc::now(),
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn delete(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        check_available(&state)?;
        state
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn adjust_quantity(&self, id: ProductId, delta: i32) -> Result<Product> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        if let Some(remaining) = state.adjust_failures.get_mut(&id)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StoreError::Unavailable(format!(
                "injected failure adjusting product {id}"
            )));
        }

        let product = state.products.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        product.quantity += delta;
        Ok(product.clone())
    }
}
