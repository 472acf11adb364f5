//! Product catalog entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId, ValidationError};

/// Collection cache key holding the full product list.
pub const ALL_PRODUCTS_CACHE_KEY: &str = "products:all";

/// A catalog product as stored by the product service.
///
/// `quantity` is only ever written by product creation and by inventory
/// reconciliation. It is allowed to go negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /products`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Option<Money>,
    #[serde(alias = "Quantity")]
    pub quantity: i32,
}

impl CreateProductRequest {
    pub fn new(name: impl Into<String>, price: Money, quantity: i32) -> Self {
        Self {
            name: name.into(),
            price: Some(price),
            quantity,
        }
    }

    /// Checks required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name is required"));
        }
        match self.price {
            None => Err(ValidationError::new("price is required")),
            Some(price) if price.is_negative() => {
                Err(ValidationError::new("price must not be negative"))
            }
            Some(_) => Ok(()),
        }
    }
}
