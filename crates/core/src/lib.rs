pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;
pub mod mining;
pub mod ports;
pub mod recommend;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::order::{Order, OrderId, OrderItem, OrderStatus};
pub use domain::product::{Product, ProductId};
pub use errors::{
    AggregationError, ApplicationError, DomainError, InterfaceError, KnowledgeError,
    RecommendationError,
};
pub use knowledge::{
    BuildJob, BuildReport, JsonFileKnowledgeStore, KnowledgeBuilder, KnowledgeCache,
    KnowledgeSnapshot, KnowledgeStore, SnapshotSummary,
};
pub use ports::{CatalogReader, OrderSource};
pub use recommend::{RecommendationEngine, RecommendationService, ScoringWeights};
