use async_trait::async_trait;
use common::{Money, Product, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{NewProduct, ProductStore, Result, StoreError};

/// PostgreSQL-backed product store.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    /// Creates a new PostgreSQL product store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn list(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, name, price_cents, quantity, created_at FROM products ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, price_cents, quantity, created_at FROM products WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    async fn create(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, price_cents, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, name, price_cents, quantity, created_at
            "#,
        )
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.quantity)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn adjust_quantity(&self, id: ProductId, delta: i32) -> Result<Product> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE products SET quantity = quantity + $1
            WHERE id = $2
            RETURNING id, name, price_cents, quantity, created_at
            "#,
        )
        .bind(delta)
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::NotFound(id)),
        }
    }
}
