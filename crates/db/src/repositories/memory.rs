use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use tokio::sync::RwLock;

use cartwise_core::domain::order::{CustomerId, Order, OrderId, OrderStatus};
use cartwise_core::domain::product::{Product, ProductId};
use cartwise_core::errors::ApplicationError;
use cartwise_core::ports::{CatalogReader, OrderSource};

use super::{OrderRepository, ProductRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.products.read().await.len() as u64)
    }
}

#[async_trait::async_trait]
impl CatalogReader for InMemoryProductRepository {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, ApplicationError> {
        Ok(ProductRepository::find_by_id(self, id).await?)
    }
}

/// Orders keyed by id so pages come out in the same order as the SQL repository.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<BTreeMap<String, Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    async fn count_settled(&self) -> Result<u64, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|order| order.is_settled()).count() as u64)
    }
}

#[async_trait::async_trait]
impl OrderSource for InMemoryOrderRepository {
    async fn settled_orders_page(
        &self,
        after: Option<&OrderId>,
        limit: u32,
    ) -> Result<Vec<Order>, ApplicationError> {
        let orders = self.orders.read().await;
        let lower = match after {
            Some(id) => Bound::Excluded(id.0.clone()),
            None => Bound::Unbounded,
        };

        Ok(orders
            .range((lower, Bound::Unbounded))
            .map(|(_, order)| order)
            .filter(|order| order.is_settled())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn recent_customer_orders(
        &self,
        customer: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, ApplicationError> {
        let orders = self.orders.read().await;
        let mut recent = orders
            .values()
            .filter(|order| &order.customer_id == customer)
            .filter(|order| order.status != OrderStatus::Cancelled)
            .cloned()
            .collect::<Vec<_>>();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}
