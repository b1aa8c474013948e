//! Read-only capabilities the recommendation pipeline needs from the order and catalog stores.

use async_trait::async_trait;

use crate::domain::order::{CustomerId, Order, OrderId};
use crate::domain::product::{Product, ProductId};
use crate::errors::ApplicationError;

#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Settled orders with their line items, ordered by id, strictly after `after`.
    /// An empty page marks the end of the history.
    async fn settled_orders_page(
        &self,
        after: Option<&OrderId>,
        limit: u32,
    ) -> Result<Vec<Order>, ApplicationError>;

    /// Up to `limit` of the customer's most recent non-cancelled orders, newest first.
    async fn recent_customer_orders(
        &self,
        customer: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, ApplicationError>;
}

#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, ApplicationError>;

    async fn product_exists(&self, id: &ProductId) -> Result<bool, ApplicationError> {
        Ok(self.find_product(id).await?.is_some())
    }
}
