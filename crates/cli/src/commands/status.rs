use std::sync::Arc;

use cartwise_core::knowledge::{JsonFileKnowledgeStore, KnowledgeCache, KnowledgeSnapshot};

use crate::commands::{build_runtime, load_config, CommandResult};

const TRENDING_IN_STATUS: usize = 5;

/// Loads every knowledge artifact from disk, the same way a serving process would.
pub fn run() -> CommandResult {
    let config = match load_config("status") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("status") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let data_dir = config.knowledge.data_dir.clone();
    let cache = KnowledgeCache::new(Arc::new(JsonFileKnowledgeStore::new(data_dir.clone())));

    match runtime.block_on(cache.refresh()) {
        Ok(snapshot) => CommandResult::success("status", render_snapshot(&snapshot)),
        Err(error) => CommandResult::failure(
            "status",
            "knowledge_unavailable",
            format!(
                "knowledge not ready in {}: {error}; run `cartwise build`",
                data_dir.display()
            ),
            7,
        ),
    }
}

fn render_snapshot(snapshot: &KnowledgeSnapshot) -> String {
    let summary = snapshot.summary();
    let trending = snapshot
        .popularity
        .ranked()
        .into_iter()
        .take(TRENDING_IN_STATUS)
        .map(|(product_id, units)| {
            let label = snapshot.names.get(product_id).unwrap_or(product_id.as_str());
            format!("{label} ({units})")
        })
        .collect::<Vec<_>>();

    let mut message = format!(
        "knowledge ready: {} associated products, {} pairs, {} popular products, {} named products",
        summary.associated_products,
        summary.association_pairs,
        summary.popular_products,
        summary.named_products
    );
    if !trending.is_empty() {
        message.push_str(&format!("; trending: {}", trending.join(", ")));
    }
    message
}

#[cfg(test)]
mod tests {
    use cartwise_core::domain::product::ProductId;
    use cartwise_core::knowledge::{
        AssociationMap, KnowledgeSnapshot, PopularityMap, ProductNameIndex,
    };

    use super::render_snapshot;

    #[test]
    fn snapshot_message_lists_trending_with_name_fallback() {
        let mut associations = AssociationMap::new();
        associations.record_pair(&ProductId::new("bread"), &ProductId::new("butter"));
        let mut popularity = PopularityMap::new();
        popularity.add(&ProductId::new("bread"), 5);
        popularity.add(&ProductId::new("butter"), 2);
        let mut names = ProductNameIndex::new();
        names.observe(&ProductId::new("bread"), "Sourdough");

        let message = render_snapshot(&KnowledgeSnapshot::new(associations, popularity, names));

        assert_eq!(
            message,
            "knowledge ready: 2 associated products, 1 pairs, 2 popular products, 1 named products; \
             trending: Sourdough (5), butter (2)"
        );
    }
}
