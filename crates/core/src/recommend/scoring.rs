//! Ranking rules over a knowledge snapshot. Everything here is pure.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::domain::product::ProductId;
use crate::knowledge::KnowledgeSnapshot;

use super::types::{CartItem, RecommendationCandidate};

/// Multipliers applied to the association count and to the log-scaled popularity boost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub association: f64,
    pub popularity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

impl ScoringWeights {
    /// `ln(popularity + 1) * weight`, so products never sold contribute nothing.
    pub fn popularity_boost(&self, popularity: u64) -> f64 {
        (popularity as f64 + 1.0).ln() * self.popularity
    }

    pub fn association_score(&self, association_count: u32, popularity: u64) -> f64 {
        f64::from(association_count) * self.association + self.popularity_boost(popularity)
    }
}

/// Candidates co-purchased with `product_id`.
///
/// Returns `None` when the product has no association data at all, which callers treat as
/// the signal to fall back to popularity. An association list emptied by `exclude` yields
/// `Some(vec![])`.
pub fn rank_associated(
    snapshot: &KnowledgeSnapshot,
    weights: &ScoringWeights,
    product_id: &ProductId,
    exclude: &HashSet<ProductId>,
    limit: usize,
) -> Option<Vec<RecommendationCandidate>> {
    let related = snapshot.associations.related(product_id).filter(|related| !related.is_empty())?;

    let candidates = related
        .iter()
        .filter(|(co_product, _)| *co_product != product_id && !exclude.contains(*co_product))
        .map(|(co_product, count)| {
            let popularity = snapshot.popularity.get(co_product);
            RecommendationCandidate {
                product_id: co_product.clone(),
                score: weights.association_score(*count, popularity),
                association_count: *count,
                popularity,
                is_fallback: false,
                matches: 1,
                name: snapshot.names.get(co_product).map(str::to_owned),
            }
        })
        .collect();

    Some(sorted_and_truncated(candidates, limit))
}

/// Products by raw popularity, descending. Used for trending and as the fallback path.
pub fn rank_by_popularity(
    snapshot: &KnowledgeSnapshot,
    exclude: &HashSet<ProductId>,
    limit: usize,
) -> Vec<RecommendationCandidate> {
    snapshot
        .popularity
        .ranked()
        .into_iter()
        .filter(|(product_id, _)| !exclude.contains(*product_id))
        .take(limit)
        .map(|(product_id, popularity)| RecommendationCandidate {
            product_id: product_id.clone(),
            score: popularity as f64,
            association_count: 0,
            popularity,
            is_fallback: true,
            matches: 0,
            name: snapshot.names.get(product_id).map(str::to_owned),
        })
        .collect()
}

/// Merges association candidates across every cart line.
///
/// The association component `count * weight * max(quantity, 1)` is summed per candidate over
/// the cart; the popularity boost is added once. Products already in the cart are never
/// suggested. Returns `None` when no cart product has association data.
pub fn rank_for_cart(
    snapshot: &KnowledgeSnapshot,
    weights: &ScoringWeights,
    cart: &[CartItem],
    limit: usize,
) -> Option<Vec<RecommendationCandidate>> {
    let basket = merge_cart_lines(cart);
    let mut merged: HashMap<&ProductId, (f64, u32, u32)> = HashMap::new();
    let mut any_associations = false;

    for (product_id, quantity) in &basket {
        let Some(related) = snapshot.associations.related(product_id) else {
            continue;
        };
        any_associations |= !related.is_empty();
        let multiplier = f64::from((*quantity).max(1));

        for (co_product, count) in related {
            if basket.contains_key(co_product) {
                continue;
            }
            let entry = merged.entry(co_product).or_insert((0.0, 0, 0));
            entry.0 += f64::from(*count) * weights.association * multiplier;
            entry.1 += *count;
            entry.2 += 1;
        }
    }

    if !any_associations {
        return None;
    }

    let candidates = merged
        .into_iter()
        .map(|(product_id, (association, association_count, matches))| {
            let popularity = snapshot.popularity.get(product_id);
            RecommendationCandidate {
                product_id: product_id.clone(),
                score: association + weights.popularity_boost(popularity),
                association_count,
                popularity,
                is_fallback: false,
                matches,
                name: snapshot.names.get(product_id).map(str::to_owned),
            }
        })
        .collect();

    Some(sorted_and_truncated(candidates, limit))
}

/// Merges per-product recommendations across a purchase history.
///
/// Each purchased product contributes its top `per_product` candidates (association ranking,
/// or the popularity fallback when it has no associations). Scores are summed per candidate
/// and anything already purchased is dropped after the per-product cut.
pub fn rank_for_history(
    snapshot: &KnowledgeSnapshot,
    weights: &ScoringWeights,
    purchased: &BTreeSet<ProductId>,
    per_product: usize,
    limit: usize,
) -> Vec<RecommendationCandidate> {
    let mut merged: HashMap<ProductId, RecommendationCandidate> = HashMap::new();
    let none = HashSet::new();

    for product_id in purchased {
        let ranked = rank_associated(snapshot, weights, product_id, &none, per_product)
            .unwrap_or_else(|| {
                rank_by_popularity(snapshot, &HashSet::from([product_id.clone()]), per_product)
            });

        for candidate in ranked {
            if purchased.contains(&candidate.product_id) {
                continue;
            }
            match merged.entry(candidate.product_id.clone()) {
                Entry::Occupied(mut entry) => {
                    let entry = entry.get_mut();
                    entry.score += candidate.score;
                    entry.association_count += candidate.association_count;
                    entry.matches += 1;
                    entry.is_fallback &= candidate.is_fallback;
                }
                Entry::Vacant(entry) => {
                    entry.insert(RecommendationCandidate { matches: 1, ..candidate });
                }
            }
        }
    }

    sorted_and_truncated(merged.into_values().collect(), limit)
}

/// Duplicate cart lines for one product collapse into a single line with summed quantity.
pub fn merge_cart_lines(cart: &[CartItem]) -> BTreeMap<ProductId, u32> {
    let mut basket = BTreeMap::new();
    for item in cart {
        let quantity = basket.entry(item.product_id.clone()).or_insert(0u32);
        *quantity = quantity.saturating_add(item.quantity);
    }
    basket
}

fn sorted_and_truncated(
    mut candidates: Vec<RecommendationCandidate>,
    limit: usize,
) -> Vec<RecommendationCandidate> {
    candidates.sort_by(compare_ranked);
    candidates.truncate(limit);
    candidates
}

/// Score descending, then product id ascending.
fn compare_ranked(a: &RecommendationCandidate, b: &RecommendationCandidate) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.product_id.cmp(&b.product_id))
}
