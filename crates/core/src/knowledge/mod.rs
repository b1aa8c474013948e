//! Knowledge pipeline: artifact storage, batch rebuilds and the served snapshot.

mod build;
mod cache;
mod snapshot;
mod store;

pub use build::{BuildJob, BuildReport, KnowledgeBuilder, TopProduct, DEFAULT_ORDER_PAGE_SIZE};
pub use cache::KnowledgeCache;
pub use snapshot::{
    AssociationMap, KnowledgeSnapshot, PopularityMap, ProductNameIndex, SnapshotSummary,
};
pub use store::{Artifact, InMemoryKnowledgeStore, JsonFileKnowledgeStore, KnowledgeStore};
