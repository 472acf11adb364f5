//! Synchronous product lookups against the product service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, Product, ProductId};
use thiserror::Error;
use tokio::sync::RwLock;

/// Why a product could not be resolved.
///
/// Every variant aborts order creation; none is retried.
#[derive(Debug, Error)]
pub enum ProductLookupError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("product service timed out")]
    Timeout,

    #[error("product service returned status {0}")]
    Status(u16),

    #[error("failed to call product service: {0}")]
    Transport(String),

    #[error("failed to decode product response: {0}")]
    Decode(String),
}

/// Source of current product name and price.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Product, ProductLookupError>;
}

#[async_trait]
impl<T: ProductCatalog + ?Sized> ProductCatalog for Arc<T> {
    async fn get_product(&self, id: ProductId) -> Result<Product, ProductLookupError> {
        (**self).get_product(id).await
    }
}

/// Product catalog client over the product service's HTTP API.
#[derive(Clone)]
pub struct HttpProductClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProductClient {
    /// Creates a client for `base_url` whose every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProductLookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProductLookupError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ProductCatalog for HttpProductClient {
    #[tracing::instrument(skip(self))]
    async fn get_product(&self, id: ProductId) -> Result<Product, ProductLookupError> {
        let response = self
            .client
            .get(format!("{}/products/{id}", self.base_url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProductLookupError::Timeout
                } else {
                    ProductLookupError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProductLookupError::NotFound(id));
        }
        if !status.is_success() {
            return Err(ProductLookupError::Status(status.as_u16()));
        }

        response.json::<Product>().await.map_err(|e| {
            if e.is_timeout() {
                ProductLookupError::Timeout
            } else {
                ProductLookupError::Decode(e.to_string())
            }
        })
    }
}

#[derive(Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    failing: HashSet<ProductId>,
}

/// In-memory product catalog for testing.
#[derive(Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<RwLock<CatalogState>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub async fn insert(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
    }

    /// Changes the price returned by later lookups.
    pub async fn set_price(&self, id: ProductId, price: Money) {
        if let Some(product) = self.state.write().await.products.get_mut(&id) {
            product.price = price;
        }
    }

    /// Makes lookups of `id` fail as if the product service timed out.
    pub async fn fail_lookups_for(&self, id: ProductId) {
        self.state.write().await.failing.insert(id);
    }

    /// Number of lookups attempted so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Product, ProductLookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        if state.failing.contains(&id) {
            return Err(ProductLookupError::Timeout);
        }
        state
            .products
            .get(&id)
            .cloned()
            .ok_or(ProductLookupError::NotFound(id))
    }
}
