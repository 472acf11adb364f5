//! Order aggregate and its request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, ProductId, ValidationError};

/// The status of an order.
///
/// Orders start out `Pending`. Any status may be set explicitly through the
/// status endpoint; there is no transition graph beyond membership in this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status an order may hold.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string does not name a known order status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status: {0}")]
pub struct InvalidStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

/// A persisted line item. Name and price are snapshots taken at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price: Money,
}

/// A persisted order with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// A line item that has been priced but not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price: Money,
}

impl NewOrderItem {
    /// Price snapshot times quantity, or `None` if it does not fit in cents.
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// A fully priced order ready to be written in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Assembles a pending order, fixing the total from the item snapshots.
    ///
    /// Fails when the total cannot be represented.
    pub fn pending(
        customer_name: impl Into<String>,
        items: Vec<NewOrderItem>,
    ) -> Result<Self, ValidationError> {
        let total_amount = items
            .iter()
            .try_fold(Money::zero(), |total, item| {
                item.line_total()
                    .and_then(|line| total.checked_add(line))
            })
            .ok_or_else(|| ValidationError::new("order total is too large"))?;
        Ok(Self {
            customer_name: customer_name.into(),
            total_amount,
            status: OrderStatus::Pending,
            items,
        })
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CreateOrderItemRequest {
    pub product_id: Option<ProductId>,
    pub quantity: i32,
}

impl CreateOrderItemRequest {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id: Some(product_id),
            quantity,
        }
    }
}

impl CreateOrderRequest {
    pub fn new(customer_name: impl Into<String>, items: Vec<CreateOrderItemRequest>) -> Self {
        Self {
            customer_name: customer_name.into(),
            items,
        }
    }

    /// Checks required fields, returning the `(product, quantity)` pairs.
    pub fn validate(&self) -> Result<Vec<(ProductId, i32)>, ValidationError> {
        if self.customer_name.trim().is_empty() {
            return Err(ValidationError::new("customer_name is required"));
        }
        if self.items.is_empty() {
            return Err(ValidationError::new("items are required"));
        }

        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let product_id = item.product_id.ok_or_else(|| {
                    ValidationError::new(format!("items[{index}].product_id is required"))
                })?;
                if item.quantity <= 0 {
                    return Err(ValidationError::new(format!(
                        "items[{index}].quantity must be positive"
                    )));
                }
                Ok((product_id, item.quantity))
            })
            .collect()
    }
}

/// Body of `PATCH /orders/{id}/status`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateStatusRequest {
    pub status: String,
}
