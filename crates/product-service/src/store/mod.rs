//! Product persistence.
//!
//! The store is the system of record for products. It assigns ids and
//! creation timestamps and owns `quantity`.

mod memory;
mod postgres;

pub use memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;

use std::sync::Arc;

use async_trait::async_trait;
use common::{CreateProductRequest, Money, Product, ProductId, ValidationError};
use thiserror::Error;

/// Errors raised by a [`ProductStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No product row has the given id.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for product store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A validated product about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub quantity: i32,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money, quantity: i32) -> Self {
        Self {
            name: name.into(),
            price,
            quantity,
        }
    }
}

impl TryFrom<CreateProductRequest> for NewProduct {
    type Error = ValidationError;

    fn try_from(req: CreateProductRequest) -> std::result::Result<Self, Self::Error> {
        req.validate()?;
        Ok(Self {
            name: req.name,
            price: req.price.unwrap_or_else(Money::zero),
            quantity: req.quantity,
        })
    }
}

/// Durable product storage.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Returns every product ordered by id.
    async fn list(&self) -> Result<Vec<Product>>;

    /// Returns the product, or `None` if the id is unknown.
    async fn get(&self, id: ProductId) -> Result<Option<Product>>;

    /// Inserts a product and returns it with its assigned id and timestamp.
    async fn create(&self, product: NewProduct) -> Result<Product>;

    /// Deletes a product. Fails with [`StoreError::NotFound`] if absent.
    async fn delete(&self, id: ProductId) -> Result<()>;

    /// Adds `delta` to the product's quantity without any lower bound.
    ///
    /// Returns the updated product, or [`StoreError::NotFound`].
    async fn adjust_quantity(&self, id: ProductId, delta: i32) -> Result<Product>;
}

#[async_trait]
impl<T: ProductStore + ?Sized> ProductStore for Arc<T> {
    async fn list(&self) -> Result<Vec<Product>> {
        (**self).list().await
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        (**self).get(id).await
    }

    async fn create(&self, product: NewProduct) -> Result<Product> {
        (**self).create(product).await
    }

    async fn delete(&self, id: ProductId) -> Result<()> {
        (**self).delete(id).await
    }

    async fn adjust_quantity(&self, id: ProductId, delta: i32) -> Result<Product> {
        (**self).adjust_quantity(id, delta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_from_request_requires_price() {
        let req = CreateProductRequest {
            name: "Widget".into(),
            price: None,
            quantity: 1,
        };
        assert!(NewProduct::try_from(req).is_err());

        let req = CreateProductRequest::new("Widget", Money::from_cents(250), 7);
        let product = NewProduct::try_from(req).unwrap();
        assert_eq!(product, NewProduct::new("Widget", Money::from_cents(250), 7));
    }
}
