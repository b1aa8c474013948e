use async_trait::async_trait;
use thiserror::Error;

use cartwise_core::domain::order::{Order, OrderId};
use cartwise_core::domain::product::{Product, ProductId};
use cartwise_core::errors::ApplicationError;

pub mod memory;
pub mod order;
pub mod product;

pub use memory::{InMemoryOrderRepository, InMemoryProductRepository};
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    /// Inserts or replaces the order together with all of its line items.
    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
    async fn count_settled(&self) -> Result<u64, RepositoryError>;
}
