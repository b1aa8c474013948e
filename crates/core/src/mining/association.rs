use std::collections::BTreeSet;

use crate::domain::order::Order;
use crate::errors::AggregationError;
use crate::knowledge::AssociationMap;

/// Counts, per product pair, the settled orders containing both products.
///
/// Each order contributes at most 1 to a pair regardless of quantities or repeated lines.
#[derive(Debug, Default)]
pub struct AssociationMiner {
    associations: AssociationMap,
    orders_scanned: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationReport {
    pub associations: AssociationMap,
    pub orders_scanned: usize,
}

impl AssociationMiner {
    pub const JOB: &'static str = "associations";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, order: &Order) {
        if !order.is_settled() {
            return;
        }
        self.orders_scanned += 1;

        let basket = order.items.iter().map(|item| &item.product_id).collect::<BTreeSet<_>>();
        let basket = basket.into_iter().collect::<Vec<_>>();
        for (index, a) in basket.iter().enumerate() {
            for b in &basket[index + 1..] {
                self.associations.record_pair(a, b);
            }
        }
    }

    pub fn orders_scanned(&self) -> usize {
        self.orders_scanned
    }

    pub fn finish(self) -> Result<AssociationReport, AggregationError> {
        if self.orders_scanned == 0 {
            return Err(AggregationError::NoHistory { job: Self::JOB });
        }

        Ok(AssociationReport {
            associations: self.associations,
            orders_scanned: self.orders_scanned,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::AssociationMiner;
    use crate::domain::order::{CustomerId, Order, OrderId, OrderItem, OrderStatus};
    use crate::domain::product::ProductId;
    use crate::errors::AggregationError;

    fn order(id: &str, status: OrderStatus, products: &[&str]) -> Order {
        Order {
            id: OrderId(id.to_owned()),
            customer_id: CustomerId::new("cust-test"),
            status,
            items: products
                .iter()
                .map(|product| OrderItem {
                    product_id: ProductId::new(*product),
                    name: product.to_uppercase(),
                    quantity: 2,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    fn id(value: &str) -> ProductId {
        ProductId::new(value)
    }

    #[test]
    fn worked_example_counts_orders_per_pair() {
        let mut miner = AssociationMiner::new();
        miner.observe(&order("o1", OrderStatus::Delivered, &["A", "B"]));
        miner.observe(&order("o2", OrderStatus::Delivered, &["A", "B"]));
        miner.observe(&order("o3", OrderStatus::Delivered, &["A", "C"]));

        let report = miner.finish().expect("report");
        let map = &report.associations;
        assert_eq!(map.count(&id("A"), &id("B")), 2);
        assert_eq!(map.count(&id("B"), &id("A")), 2);
        assert_eq!(map.count(&id("A"), &id("C")), 1);
        assert_eq!(map.count(&id("C"), &id("A")), 1);
        assert_eq!(map.count(&id("B"), &id("C")), 0);
    }

    #[test]
    fn repeated_lines_in_one_order_count_once() {
        let mut miner = AssociationMiner::new();
        miner.observe(&order("o1", OrderStatus::Preparing, &["A", "B", "A", "B", "B"]));

        let report = miner.finish().expect("report");
        assert_eq!(report.associations.count(&id("A"), &id("B")), 1);
        assert_eq!(report.associations.count(&id("A"), &id("A")), 0);
    }

    #[test]
    fn mined_map_is_symmetric_without_self_pairs() {
        let mut miner = AssociationMiner::new();
        miner.observe(&order("o1", OrderStatus::Delivered, &["A", "B", "C", "D"]));
        miner.observe(&order("o2", OrderStatus::OutForDelivery, &["B", "D", "E"]));
        miner.observe(&order("o3", OrderStatus::Delivered, &["E", "A", "E"]));
        miner.observe(&order("o4", OrderStatus::Cancelled, &["A", "Z"]));

        let report = miner.finish().expect("report");
        assert!(report.associations.is_symmetric());
        assert_eq!(report.associations.count(&id("A"), &id("Z")), 0);
        assert_eq!(report.orders_scanned, 3);
    }

    #[test]
    fn single_item_orders_count_toward_history_but_yield_no_pairs() {
        let mut miner = AssociationMiner::new();
        miner.observe(&order("o1", OrderStatus::Delivered, &["A"]));

        let report = miner.finish().expect("single-item history is still history");
        assert!(report.associations.is_empty());
    }

    #[test]
    fn unsettled_history_is_rejected() {
        let mut miner = AssociationMiner::new();
        miner.observe(&order("o1", OrderStatus::Cancelled, &["A", "B"]));

        assert_eq!(
            miner.finish().expect_err("no settled orders"),
            AggregationError::NoHistory { job: "associations" }
        );
    }
}
