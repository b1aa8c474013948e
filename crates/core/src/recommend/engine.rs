//! Recommendation engine over the cached knowledge snapshot.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::scoring::{self, ScoringWeights};
use super::types::{CartItem, RecommendationCandidate};
use crate::domain::product::ProductId;
use crate::errors::KnowledgeError;
use crate::knowledge::{KnowledgeCache, KnowledgeSnapshot};

/// Holds a handle to the cache and nothing per call; every query ranks against the snapshot
/// published when it started.
#[derive(Clone)]
pub struct RecommendationEngine {
    cache: Arc<KnowledgeCache>,
    weights: ScoringWeights,
}

impl RecommendationEngine {
    pub fn new(cache: Arc<KnowledgeCache>) -> Self {
        Self { cache, weights: ScoringWeights::default() }
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn cache(&self) -> &Arc<KnowledgeCache> {
        &self.cache
    }

    pub async fn recommend_for_product(
        &self,
        product_id: &ProductId,
        limit: usize,
        exclude_ids: &[ProductId],
    ) -> Result<Vec<RecommendationCandidate>, KnowledgeError> {
        let snapshot = self.cache.ensure_loaded().await?;
        let mut exclude = exclude_ids.iter().cloned().collect::<HashSet<_>>();

        if let Some(ranked) =
            scoring::rank_associated(&snapshot, &self.weights, product_id, &exclude, limit)
        {
            return Ok(ranked);
        }

        debug!(
            event_name = "recommend.product.fallback",
            product_id = %product_id,
            snapshot_version = snapshot.version,
            "no associations for product; serving trending products"
        );
        exclude.insert(product_id.clone());
        Ok(scoring::rank_by_popularity(&snapshot, &exclude, limit))
    }

    pub async fn trending(
        &self,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>, KnowledgeError> {
        let snapshot = self.cache.ensure_loaded().await?;
        Ok(scoring::rank_by_popularity(&snapshot, &HashSet::new(), limit))
    }

    pub async fn recommend_for_cart(
        &self,
        cart: &[CartItem],
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>, KnowledgeError> {
        if cart.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.cache.ensure_loaded().await?;
        if let Some(ranked) = scoring::rank_for_cart(&snapshot, &self.weights, cart, limit) {
            return Ok(ranked);
        }

        debug!(
            event_name = "recommend.cart.fallback",
            cart_lines = cart.len(),
            snapshot_version = snapshot.version,
            "no associations for any cart product; serving trending products"
        );
        let exclude = cart.iter().map(|item| item.product_id.clone()).collect::<HashSet<_>>();
        Ok(scoring::rank_by_popularity(&snapshot, &exclude, limit))
    }

    /// "Just for you": related products of everything in `purchased`, merged by summed score.
    /// An empty history is served the trending list.
    pub async fn recommend_for_history(
        &self,
        purchased: &BTreeSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>, KnowledgeError> {
        let snapshot = self.cache.ensure_loaded().await?;
        if purchased.is_empty() {
            return Ok(scoring::rank_by_popularity(&snapshot, &HashSet::new(), limit));
        }

        let ranked = scoring::rank_for_history(
            &snapshot,
            &self.weights,
            purchased,
            super::HISTORY_PER_PRODUCT_LIMIT,
            limit,
        );
        if !ranked.is_empty() {
            return Ok(ranked);
        }

        debug!(
            event_name = "recommend.history.fallback",
            purchased_products = purchased.len(),
            snapshot_version = snapshot.version,
            "history yielded nothing new; serving trending products"
        );
        let exclude = purchased.iter().cloned().collect::<HashSet<_>>();
        Ok(scoring::rank_by_popularity(&snapshot, &exclude, limit))
    }

    pub async fn refresh(&self) -> Result<Arc<KnowledgeSnapshot>, KnowledgeError> {
        self.cache.refresh().await
    }
}
