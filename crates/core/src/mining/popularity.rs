use crate::domain::order::Order;
use crate::errors::AggregationError;
use crate::knowledge::{PopularityMap, ProductNameIndex};

/// Sums sold quantities per product over settled orders.
#[derive(Debug, Default)]
pub struct PopularityAggregator {
    popularity: PopularityMap,
    names: ProductNameIndex,
    orders_scanned: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopularityReport {
    pub popularity: PopularityMap,
    pub names: ProductNameIndex,
    pub orders_scanned: usize,
}

impl PopularityAggregator {
    pub const JOB: &'static str = "popularity";

    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one order in. Orders that are not settled are ignored.
    pub fn observe(&mut self, order: &Order) {
        if !order.is_settled() {
            return;
        }
        self.orders_scanned += 1;

        for item in &order.items {
            self.names.observe(&item.product_id, &item.name);
            self.popularity.add(&item.product_id, u64::from(item.quantity));
        }
    }

    pub fn orders_scanned(&self) -> usize {
        self.orders_scanned
    }

    pub fn finish(self) -> Result<PopularityReport, AggregationError> {
        if self.orders_scanned == 0 {
            return Err(AggregationError::NoHistory { job: Self::JOB });
        }

        Ok(PopularityReport {
            popularity: self.popularity,
            names: self.names,
            orders_scanned: self.orders_scanned,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::PopularityAggregator;
    use crate::domain::order::{CustomerId, Order, OrderId, OrderItem, OrderStatus};
    use crate::domain::product::ProductId;
    use crate::errors::AggregationError;

    fn order(id: &str, status: OrderStatus, items: &[(&str, &str, u32)]) -> Order {
        Order {
            id: OrderId(id.to_owned()),
            customer_id: CustomerId::new("cust-test"),
            status,
            items: items
                .iter()
                .map(|(product, name, quantity)| OrderItem {
                    product_id: ProductId::new(*product),
                    name: (*name).to_owned(),
                    quantity: *quantity,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn popularity_reconciles_with_independent_sum() {
        let orders = vec![
            order("o1", OrderStatus::Delivered, &[("apple", "Apple", 3), ("milk", "Milk", 1)]),
            order("o2", OrderStatus::Preparing, &[("apple", "Apple", 2), ("apple", "Apple", 1)]),
            order("o3", OrderStatus::OutForDelivery, &[("milk", "Milk", 4)]),
            order("o4", OrderStatus::Cancelled, &[("apple", "Apple", 100)]),
            order("o5", OrderStatus::Pending, &[("milk", "Milk", 100)]),
        ];

        let mut aggregator = PopularityAggregator::new();
        for order in &orders {
            aggregator.observe(order);
        }
        let report = aggregator.finish().expect("settled orders exist");

        let mut expected: HashMap<&str, u64> = HashMap::new();
        for order in orders.iter().filter(|order| order.status.is_settled()) {
            for item in &order.items {
                *expected.entry(item.product_id.as_str()).or_default() += u64::from(item.quantity);
            }
        }

        assert_eq!(report.orders_scanned, 3);
        for (product, total) in expected {
            assert_eq!(report.popularity.get(&ProductId::new(product)), total);
        }
        assert_eq!(report.popularity.get(&ProductId::new("apple")), 6);
    }

    #[test]
    fn name_index_keeps_first_seen_label() {
        let mut aggregator = PopularityAggregator::new();
        aggregator.observe(&order("o1", OrderStatus::Delivered, &[("p1", "Tomato", 1)]));
        aggregator.observe(&order("o2", OrderStatus::Delivered, &[("p1", "Roma Tomato", 1)]));

        let report = aggregator.finish().expect("report");
        assert_eq!(report.names.get(&ProductId::new("p1")), Some("Tomato"));
    }

    #[test]
    fn no_settled_orders_is_a_hard_failure() {
        let mut aggregator = PopularityAggregator::new();
        aggregator.observe(&order("o1", OrderStatus::Pending, &[("p1", "Tomato", 1)]));

        assert_eq!(
            aggregator.finish().expect_err("no history"),
            AggregationError::NoHistory { job: "popularity" }
        );
    }
}
