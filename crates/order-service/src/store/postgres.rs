use std::collections::HashMap;

use async_trait::async_trait;
use common::{Money, NewOrder, Order, OrderId, OrderItem, OrderStatus, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{OrderStore, Result, StoreError};

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            customer_name: row.try_get("customer_name")?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            status: status
                .parse()
                .map_err(|e: common::InvalidStatus| StoreError::InvalidRow(e.to_string()))?,
            items: Vec::new(),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: row.try_get("id")?,
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: row.try_get("quantity")?,
            price: Money::from_cents(row.try_get("price_cents")?),
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(customer = %order.customer_name, items = order.items.len()))]
    async fn create(&self, order: NewOrder) -> Result<Order> {
        // Dropping the transaction without commit rolls it back
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_name, total_amount_cents, status)
            VALUES ($1, $2, $3)
            RETURNING id, customer_name, total_amount_cents, status, created_at
            "#,
        )
        .bind(&order.customer_name)
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let mut created = Self::row_to_order(&row)?;

        for item in &order.items {
            let row = sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, order_id, product_id, product_name, quantity, price_cents
                "#,
            )
            .bind(created.id.as_i64())
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price.cents())
            .fetch_one(&mut *tx)
            .await?;
            created.items.push(Self::row_to_item(&row)?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_name, total_amount_cents, status, created_at
            FROM orders
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = Self::row_to_item(row)?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }
        for order in &mut orders {
            order.items = items_by_order.remove(&order.id).unwrap_or_default();
        }

        Ok(orders)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, customer_name, total_amount_cents, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = Self::row_to_order(&row)?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        order.items = item_rows
            .iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(order))
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
