use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use cartwise_core::domain::product::{Product, ProductId};
use cartwise_core::errors::ApplicationError;
use cartwise_core::ports::CatalogReader;

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, price, image, stock, category, is_active
             FROM product
             WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let timestamp = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO product (
                id, name, price, image, stock, category, is_active, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                image = excluded.image,
                stock = excluded.stock,
                category = excluded.category,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.to_string())
        .bind(&product.image)
        .bind(i64::from(product.stock))
        .bind(&product.category)
        .bind(product.active)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count = sqlx::query("SELECT COUNT(*) AS count FROM product")
            .fetch_one(&self.pool)
            .await?
            .try_get::<i64, _>("count")?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait::async_trait]
impl CatalogReader for SqlProductRepository {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, ApplicationError> {
        Ok(ProductRepository::find_by_id(self, id).await?)
    }
}

fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    let price_raw = row.try_get::<String, _>("price")?;
    let price = Decimal::from_str(&price_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid product price `{price_raw}` ({error})"))
    })?;
    let stock = row.try_get::<i64, _>("stock")?;

    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        price,
        image: row.try_get("image")?,
        stock: u32::try_from(stock).map_err(|_| {
            RepositoryError::Decode(format!("invalid value for `stock` (expected u32): {stock}"))
        })?,
        category: row.try_get("category")?,
        active: row.try_get("is_active")?,
    })
}
