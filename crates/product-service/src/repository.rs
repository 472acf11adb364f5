//! Cache-aside reads and write-time invalidation over the product store.

use std::time::Duration;

use common::{ALL_PRODUCTS_CACHE_KEY, Product, ProductId};
use platform::{Cache, CacheExt};
use serde::Serialize;

use crate::store::{NewProduct, ProductStore, Result};

/// Product access with read-through caching.
///
/// Reads try the cache first and populate it from the store on a miss.
/// Writes go to the store first and then remove the affected keys. Every
/// cache failure is logged and treated as a miss; none reaches the caller.
///
/// A reader that misses, fetches from the store, and writes its result
/// after a concurrent invalidation can leave a stale entry for up to one
/// TTL.
pub struct CachedProductRepository<S, C> {
    store: S,
    cache: C,
    ttl: Duration,
}

impl<S: ProductStore, C: Cache> CachedProductRepository<S, C> {
    pub fn new(store: S, cache: C, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns every product, from `products:all` when cached.
    #[tracing::instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Product>> {
        if let Some(products) = self.cached::<Vec<Product>>(ALL_PRODUCTS_CACHE_KEY).await {
            return Ok(products);
        }

        let products = self.store.list().await?;
        self.populate(ALL_PRODUCTS_CACHE_KEY, &products).await;
        Ok(products)
    }

    /// Returns one product, from `product:{id}` when cached.
    ///
    /// An unknown id is `Ok(None)` and is never cached.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        let key = id.cache_key();
        if let Some(product) = self.cached::<Product>(&key).await {
            return Ok(Some(product));
        }

        let Some(product) = self.store.get(id).await? else {
            return Ok(None);
        };
        self.populate(&key, &product).await;
        Ok(Some(product))
    }

    /// Inserts a product and drops the collection entry.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&self, product: NewProduct) -> Result<Product> {
        let product = self.store.create(product).await?;
        self.invalidate(ALL_PRODUCTS_CACHE_KEY).await;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Deletes a product and drops both its entry and the collection entry.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<()> {
        self.store.delete(id).await?;
        self.invalidate(&id.cache_key()).await;
        self.invalidate(ALL_PRODUCTS_CACHE_KEY).await;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn cached<T: serde::de::DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        match self.cache.get_json::<T>(key).await {
            Ok(Some(value)) => {
                metrics::counter!("cache_hits_total").increment(1);
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Ok(None) => {
                metrics::counter!("cache_misses_total").increment(1);
                tracing::debug!(key, "cache miss");
                None
            }
            Err(e) => {
                metrics::counter!("cache_errors_total").increment(1);
                metrics::counter!("cache_misses_total").increment(1);
                tracing::warn!(key, error = %e, "cache read failed, falling back to store");
                None
            }
        }
    }

    async fn populate<T: Serialize + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set_json(key, value, self.ttl).await {
            metrics::counter!("cache_errors_total").increment(1);
            tracing::warn!(key, error = %e, "failed to populate cache");
        }
    }

    async fn invalidate(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            metrics::counter!("cache_errors_total").increment(1);
            tracing::warn!(key, error = %e, "failed to invalidate cache");
        }
    }
}
