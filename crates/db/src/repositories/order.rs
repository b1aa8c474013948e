use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use cartwise_core::domain::order::{CustomerId, Order, OrderId, OrderItem, OrderStatus};
use cartwise_core::domain::product::ProductId;
use cartwise_core::errors::ApplicationError;
use cartwise_core::ports::OrderSource;

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// One keyset page of settled orders joined with their items, in order id order.
    pub async fn settled_page(
        &self,
        after: Option<&OrderId>,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let [preparing, out_for_delivery, delivered] = OrderStatus::SETTLED;
        let after = after.map(|id| id.0.as_str());

        let rows = sqlx::query(
            "WITH page AS (
                SELECT id, customer_id, status, created_at
                FROM customer_order
                WHERE status IN (?, ?, ?)
                  AND (? IS NULL OR id > ?)
                ORDER BY id
                LIMIT ?
             )
             SELECT
                page.id AS order_id,
                page.customer_id,
                page.status,
                page.created_at,
                item.product_id,
                item.name,
                item.quantity
             FROM page
             LEFT JOIN order_item AS item ON item.order_id = page.id
             ORDER BY page.id, item.line_no",
        )
        .bind(preparing.as_str())
        .bind(out_for_delivery.as_str())
        .bind(delivered.as_str())
        .bind(after)
        .bind(after)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        fold_order_rows(rows)
    }

    /// The customer's latest orders, newest first, skipping cancelled ones.
    pub async fn recent_for_customer(
        &self,
        customer: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "WITH recent AS (
                SELECT id, customer_id, status, created_at
                FROM customer_order
                WHERE customer_id = ? AND status <> ?
                ORDER BY created_at DESC, id DESC
                LIMIT ?
             )
             SELECT
                recent.id AS order_id,
                recent.customer_id,
                recent.status,
                recent.created_at,
                item.product_id,
                item.name,
                item.quantity
             FROM recent
             LEFT JOIN order_item AS item ON item.order_id = recent.id
             ORDER BY recent.created_at DESC, recent.id DESC, item.line_no",
        )
        .bind(customer.as_str())
        .bind(OrderStatus::Cancelled.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        fold_order_rows(rows)
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                customer_order.id AS order_id,
                customer_order.customer_id,
                customer_order.status,
                customer_order.created_at,
                item.product_id,
                item.name,
                item.quantity
             FROM customer_order
             LEFT JOIN order_item AS item ON item.order_id = customer_order.id
             WHERE customer_order.id = ?
             ORDER BY item.line_no",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(fold_order_rows(rows)?.pop())
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customer_order (id, customer_id, status, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                customer_id = excluded.customer_id,
                status = excluded.status,
                created_at = excluded.created_at",
        )
        .bind(&order.id.0)
        .bind(order.customer_id.as_str())
        .bind(order.status.as_str())
        .bind(order.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_item WHERE order_id = ?")
            .bind(&order.id.0)
            .execute(&mut *tx)
            .await?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_item (order_id, line_no, product_id, name, quantity)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(line_no as i64)
            .bind(item.product_id.as_str())
            .bind(&item.name)
            .bind(i64::from(item.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_settled(&self) -> Result<u64, RepositoryError> {
        let [preparing, out_for_delivery, delivered] = OrderStatus::SETTLED;
        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM customer_order WHERE status IN (?, ?, ?)",
        )
        .bind(preparing.as_str())
        .bind(out_for_delivery.as_str())
        .bind(delivered.as_str())
        .fetch_one(&self.pool)
        .await?
        .try_get::<i64, _>("count")?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait::async_trait]
impl OrderSource for SqlOrderRepository {
    async fn settled_orders_page(
        &self,
        after: Option<&OrderId>,
        limit: u32,
    ) -> Result<Vec<Order>, ApplicationError> {
        Ok(self.settled_page(after, limit).await?)
    }

    async fn recent_customer_orders(
        &self,
        customer: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, ApplicationError> {
        Ok(self.recent_for_customer(customer, limit).await?)
    }
}

/// Groups joined (order, item) rows back into orders. Rows of one order must be adjacent.
fn fold_order_rows(rows: Vec<SqliteRow>) -> Result<Vec<Order>, RepositoryError> {
    let mut orders: Vec<Order> = Vec::new();

    for row in rows {
        let order_id = row.try_get::<String, _>("order_id")?;
        let starts_new_order = orders.last().map_or(true, |order| order.id.0 != order_id);
        if starts_new_order {
            let status_raw = row.try_get::<String, _>("status")?;
            let status = status_raw.parse::<OrderStatus>().map_err(|_| {
                RepositoryError::Decode(format!("unknown order status `{status_raw}`"))
            })?;
            orders.push(Order {
                id: OrderId(order_id),
                customer_id: CustomerId(row.try_get("customer_id")?),
                status,
                items: Vec::new(),
                created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
            });
        }

        let Some(product_id) = row.try_get::<Option<String>, _>("product_id")? else {
            continue;
        };
        let quantity = row.try_get::<i64, _>("quantity")?;
        let item = OrderItem {
            product_id: ProductId(product_id),
            name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
            quantity: u32::try_from(quantity).map_err(|_| {
                RepositoryError::Decode(format!(
                    "invalid value for `quantity` (expected non-negative u32): {quantity}"
                ))
            })?,
        };
        if let Some(order) = orders.last_mut() {
            order.items.push(item);
        }
    }

    Ok(orders)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
