//! Offline extraction of popularity and co-purchase statistics from settled orders.

mod association;
mod popularity;

pub use association::{AssociationMiner, AssociationReport};
pub use popularity::{PopularityAggregator, PopularityReport};
