//! Knowledge maps produced by the batch jobs and served by the cache.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::product::ProductId;

/// Co-occurrence counts: product -> co-product -> number of settled orders containing both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AssociationMap {
    pairs: HashMap<ProductId, HashMap<ProductId, u32>>,
}

impl AssociationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one order in which both products appear. Self-pairs are ignored.
    pub fn record_pair(&mut self, a: &ProductId, b: &ProductId) {
        if a == b {
            return;
        }
        *self.pairs.entry(a.clone()).or_default().entry(b.clone()).or_insert(0) += 1;
        *self.pairs.entry(b.clone()).or_default().entry(a.clone()).or_insert(0) += 1;
    }

    pub fn related(&self, product_id: &ProductId) -> Option<&HashMap<ProductId, u32>> {
        self.pairs.get(product_id)
    }

    pub fn count(&self, a: &ProductId, b: &ProductId) -> u32 {
        self.pairs.get(a).and_then(|related| related.get(b)).copied().unwrap_or(0)
    }

    pub fn product_count(&self) -> usize {
        self.pairs.len()
    }

    /// Number of distinct unordered pairs.
    pub fn pair_count(&self) -> usize {
        self.pairs.values().map(HashMap::len).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_symmetric(&self) -> bool {
        self.pairs.iter().all(|(a, related)| {
            related.iter().all(|(b, count)| a != b && self.count(b, a) == *count)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, &HashMap<ProductId, u32>)> {
        self.pairs.iter()
    }
}

impl Serialize for AssociationMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut products = self.pairs.iter().collect::<Vec<_>>();
        products.sort_by(|a, b| a.0.cmp(b.0));

        serializer.collect_map(products.into_iter().map(|(product_id, related)| {
            (product_id, SortedCounts(ranked(related.iter().map(|(id, count)| (id, *count)))))
        }))
    }
}

/// Cumulative unit quantity sold per product.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PopularityMap {
    counts: HashMap<ProductId, u64>,
}

impl PopularityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, product_id: &ProductId, quantity: u64) {
        *self.counts.entry(product_id.clone()).or_insert(0) += quantity;
    }

    pub fn get(&self, product_id: &ProductId) -> u64 {
        self.counts.get(product_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Products by count descending, ties by product id ascending.
    pub fn ranked(&self) -> Vec<(&ProductId, u64)> {
        ranked(self.counts.iter().map(|(id, count)| (id, *count)))
    }
}

impl Serialize for PopularityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.ranked())
    }
}

/// Display names captured while aggregating orders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ProductNameIndex {
    names: HashMap<ProductId, String>,
}

impl ProductNameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name` unless a non-blank name was already seen for the product.
    /// The first non-blank name observed wins.
    pub fn observe(&mut self, product_id: &ProductId, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.names.entry(product_id.clone()).or_insert_with(|| name.to_owned());
    }

    pub fn get(&self, product_id: &ProductId) -> Option<&str> {
        self.names.get(product_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Serialize for ProductNameIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries = self.names.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        serializer.collect_map(entries)
    }
}

/// The atomic triple served to the engine. Published by the cache, never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct KnowledgeSnapshot {
    pub associations: AssociationMap,
    pub popularity: PopularityMap,
    pub names: ProductNameIndex,
    /// Assigned by the cache on publish; 0 until published.
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
}

impl KnowledgeSnapshot {
    pub fn new(
        associations: AssociationMap,
        popularity: PopularityMap,
        names: ProductNameIndex,
    ) -> Self {
        Self { associations, popularity, names, version: 0, loaded_at: Utc::now() }
    }

    pub fn empty() -> Self {
        Self::new(AssociationMap::new(), PopularityMap::new(), ProductNameIndex::new())
    }

    pub(crate) fn published(mut self, version: u64) -> Self {
        self.version = version;
        self.loaded_at = Utc::now();
        self
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            version: self.version,
            loaded_at: self.loaded_at,
            associated_products: self.associations.product_count(),
            association_pairs: self.associations.pair_count(),
            popular_products: self.popularity.len(),
            named_products: self.names.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
    pub associated_products: usize,
    pub association_pairs: usize,
    pub popular_products: usize,
    pub named_products: usize,
}

struct SortedCounts<'a>(Vec<(&'a ProductId, u32)>);

impl Serialize for SortedCounts<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(id, count)| (*id, *count)))
    }
}

fn ranked<'a, N: Ord + Copy>(
    entries: impl Iterator<Item = (&'a ProductId, N)>,
) -> Vec<(&'a ProductId, N)> {
    let mut entries = entries.collect::<Vec<_>>();
    entries.sort_by(|a, b| match b.1.cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::{AssociationMap, PopularityMap, ProductNameIndex};
    use crate::domain::product::ProductId;

    fn id(value: &str) -> ProductId {
        ProductId::new(value)
    }

    #[test]
    fn record_pair_is_symmetric_and_skips_self_pairs() {
        let mut map = AssociationMap::new();
        map.record_pair(&id("a"), &id("b"));
        map.record_pair(&id("b"), &id("a"));
        map.record_pair(&id("a"), &id("a"));

        assert_eq!(map.count(&id("a"), &id("b")), 2);
        assert_eq!(map.count(&id("b"), &id("a")), 2);
        assert_eq!(map.count(&id("a"), &id("a")), 0);
        assert_eq!(map.pair_count(), 1);
        assert!(map.is_symmetric());
    }

    #[test]
    fn popularity_is_persisted_in_descending_order() {
        let mut popularity = PopularityMap::new();
        popularity.add(&id("carrot"), 2);
        popularity.add(&id("apple"), 9);
        popularity.add(&id("banana"), 2);

        let json = serde_json::to_string(&popularity).expect("serialize");
        assert_eq!(json, r#"{"apple":9,"banana":2,"carrot":2}"#);
    }

    #[test]
    fn persisted_popularity_parses_without_relying_on_order() {
        let popularity: PopularityMap =
            serde_json::from_str(r#"{"b":1,"a":7}"#).expect("deserialize");

        assert_eq!(popularity.get(&id("a")), 7);
        assert_eq!(popularity.ranked()[0].0, &id("a"));
    }

    #[test]
    fn first_non_blank_name_wins() {
        let mut names = ProductNameIndex::new();
        names.observe(&id("p1"), "  ");
        names.observe(&id("p1"), "Alphonso Mango");
        names.observe(&id("p1"), "Mango (renamed)");

        assert_eq!(names.get(&id("p1")), Some("Alphonso Mango"));
    }

    #[test]
    fn association_map_survives_json_persistence() {
        let mut map = AssociationMap::new();
        map.record_pair(&id("a"), &id("b"));
        map.record_pair(&id("a"), &id("c"));
        map.record_pair(&id("a"), &id("b"));

        let json = serde_json::to_string(&map).expect("serialize");
        assert!(json.starts_with(r#"{"a":{"b":2,"c":1}"#));

        let parsed: AssociationMap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, map);
    }
}
