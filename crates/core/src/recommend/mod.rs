//! "Bought together" recommendations ranked from the knowledge snapshot.

mod engine;
mod scoring;
mod service;
mod types;

pub use engine::RecommendationEngine;
pub use scoring::{merge_cart_lines, ScoringWeights};
pub use service::RecommendationService;
pub use types::*;

/// Candidates taken from each purchased product before merging a purchase history.
pub const HISTORY_PER_PRODUCT_LIMIT: usize = 5;

pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights { association: 10.0, popularity: 2.0 };
