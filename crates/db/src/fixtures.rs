use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use cartwise_core::domain::order::{CustomerId, Order, OrderId, OrderItem, OrderStatus};
use cartwise_core::domain::product::{Product, ProductId};

use crate::connection::DbPool;
use crate::repositories::{
    OrderRepository, ProductRepository, RepositoryError, SqlOrderRepository, SqlProductRepository,
};

/// (id, name, price in cents, category, stock)
const DEMO_PRODUCTS: &[(&str, &str, i64, &str, u32)] = &[
    ("prod-milk", "Whole Milk 1L", 129, "dairy", 80),
    ("prod-butter", "Salted Butter", 249, "dairy", 35),
    ("prod-eggs", "Free Range Eggs (12)", 399, "dairy", 50),
    ("prod-bread", "Sourdough Loaf", 349, "bakery", 25),
    ("prod-jam", "Strawberry Jam", 299, "pantry", 30),
    ("prod-pasta", "Penne Rigate 500g", 189, "pantry", 60),
    ("prod-sauce", "Tomato Basil Sauce", 279, "pantry", 40),
    ("prod-parmesan", "Parmigiano Reggiano", 649, "dairy", 15),
    ("prod-coffee", "Ground Coffee 250g", 799, "beverages", 20),
    ("prod-bananas", "Bananas (bunch)", 159, "produce", 45),
];

struct OrderSeed {
    id: &'static str,
    customer: &'static str,
    status: OrderStatus,
    items: &'static [(&'static str, &'static str, u32)],
}

/// `prod-oat-milk` is sold in history but absent from the catalog, exercising stale references.
const DEMO_ORDERS: &[OrderSeed] = &[
    OrderSeed {
        id: "ord-0001",
        customer: "cust-ada",
        status: OrderStatus::Delivered,
        items: &[
            ("prod-bread", "Sourdough Loaf", 1),
            ("prod-butter", "Salted Butter", 1),
            ("prod-jam", "Strawberry Jam", 1),
        ],
    },
    OrderSeed {
        id: "ord-0002",
        customer: "cust-ben",
        status: OrderStatus::Delivered,
        items: &[
            ("prod-pasta", "Penne Rigate 500g", 2),
            ("prod-sauce", "Tomato Basil Sauce", 2),
            ("prod-parmesan", "Parmigiano Reggiano", 1),
        ],
    },
    OrderSeed {
        id: "ord-0003",
        customer: "cust-cleo",
        status: OrderStatus::Delivered,
        items: &[
            ("prod-milk", "Whole Milk 1L", 2),
            ("prod-coffee", "Ground Coffee 250g", 1),
            ("prod-bananas", "Bananas (bunch)", 1),
        ],
    },
    OrderSeed {
        id: "ord-0004",
        customer: "cust-ada",
        status: OrderStatus::OutForDelivery,
        items: &[
            ("prod-bread", "Sourdough Loaf", 2),
            ("prod-butter", "Salted Butter", 1),
            ("prod-milk", "Whole Milk 1L", 1),
        ],
    },
    OrderSeed {
        id: "ord-0005",
        customer: "cust-ben",
        status: OrderStatus::Preparing,
        items: &[
            ("prod-pasta", "Penne Rigate 500g", 1),
            ("prod-sauce", "Tomato Basil Sauce", 1),
        ],
    },
    OrderSeed {
        id: "ord-0006",
        customer: "cust-dev",
        status: OrderStatus::Delivered,
        items: &[
            ("prod-eggs", "Free Range Eggs (12)", 1),
            ("prod-bread", "Sourdough Loaf", 1),
            ("prod-milk", "Whole Milk 1L", 1),
        ],
    },
    OrderSeed {
        id: "ord-0007",
        customer: "cust-cleo",
        status: OrderStatus::Delivered,
        items: &[
            ("prod-coffee", "Ground Coffee 250g", 1),
            ("prod-oat-milk", "Oat Drink 1L", 2),
        ],
    },
    OrderSeed {
        id: "ord-0008",
        customer: "cust-dev",
        status: OrderStatus::Cancelled,
        items: &[
            ("prod-parmesan", "Parmigiano Reggiano", 5),
            ("prod-jam", "Strawberry Jam", 5),
        ],
    },
    OrderSeed {
        id: "ord-0009",
        customer: "cust-eli",
        status: OrderStatus::Pending,
        items: &[
            ("prod-bananas", "Bananas (bunch)", 3),
            ("prod-eggs", "Free Range Eggs (12)", 1),
        ],
    },
    OrderSeed {
        id: "ord-0010",
        customer: "cust-ada",
        status: OrderStatus::Delivered,
        items: &[
            ("prod-bread", "Sourdough Loaf", 1),
            ("prod-jam", "Strawberry Jam", 1),
            ("prod-bread", "Sourdough Loaf", 1),
        ],
    },
];

/// Deterministic grocery catalog and order history for local demos and smoke tests.
pub struct GroceryDemoDataset;

impl GroceryDemoDataset {
    pub fn products() -> Vec<Product> {
        DEMO_PRODUCTS
            .iter()
            .map(|(id, name, price_cents, category, stock)| Product {
                id: ProductId::new(*id),
                name: (*name).to_string(),
                price: Decimal::new(*price_cents, 2),
                image: format!("/images/products/{id}.jpg"),
                stock: *stock,
                category: (*category).to_string(),
                active: true,
            })
            .collect()
    }

    pub fn orders() -> Vec<Order> {
        let base = demo_epoch();
        DEMO_ORDERS
            .iter()
            .enumerate()
            .map(|(index, seed)| Order {
                id: OrderId(seed.id.to_string()),
                customer_id: CustomerId::new(seed.customer),
                status: seed.status,
                items: seed
                    .items
                    .iter()
                    .map(|(product_id, name, quantity)| OrderItem {
                        product_id: ProductId::new(*product_id),
                        name: (*name).to_string(),
                        quantity: *quantity,
                    })
                    .collect(),
                created_at: base + Duration::hours(index as i64 * 6),
            })
            .collect()
    }

    /// Upserts the dataset; running it twice leaves the same rows behind.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let products = SqlProductRepository::new(pool.clone());
        let orders = SqlOrderRepository::new(pool.clone());

        let catalog = Self::products();
        let history = Self::orders();
        let settled_orders = history.iter().filter(|order| order.is_settled()).count();

        for product in &catalog {
            products.save(product.clone()).await?;
        }
        for order in &history {
            orders.save(order.clone()).await?;
        }

        Ok(SeedResult {
            products_seeded: catalog.len(),
            orders_seeded: history.len(),
            settled_orders,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let products = SqlProductRepository::new(pool.clone());
        let orders = SqlOrderRepository::new(pool.clone());

        let expected_settled =
            DEMO_ORDERS.iter().filter(|seed| seed.status.is_settled()).count() as u64;

        let mut checks = Vec::new();
        checks.push(("catalog-count", products.count().await? >= DEMO_PRODUCTS.len() as u64));
        checks.push(("settled-history", orders.count_settled().await? >= expected_settled));

        let mut all_products_present = true;
        for (id, ..) in DEMO_PRODUCTS {
            all_products_present &= products.find_by_id(&ProductId::new(*id)).await?.is_some();
        }
        checks.push(("catalog-products", all_products_present));

        let mut order_lines_match = true;
        for seed in DEMO_ORDERS {
            let stored = orders.find_by_id(&OrderId(seed.id.to_string())).await?;
            order_lines_match &= stored.is_some_and(|order| {
                order.status == seed.status
                    && order.customer_id.as_str() == seed.customer
                    && order.items.len() == seed.items.len()
            });
        }
        checks.push(("order-lines", order_lines_match));

        Ok(VerificationResult { all_present: checks.iter().all(|(_, passed)| *passed), checks })
    }
}

fn demo_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).single().unwrap_or_else(Utc::now)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub products_seeded: usize,
    pub orders_seeded: usize,
    pub settled_orders: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::GroceryDemoDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn demo_dataset_loads_idempotently_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let first = GroceryDemoDataset::load(&pool).await.expect("first load");
        let second = GroceryDemoDataset::load(&pool).await.expect("second load");
        assert_eq!(first, second);
        assert_eq!(first.settled_orders, 8);

        let verification = GroceryDemoDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
        pool.close().await;
    }

    #[test]
    fn history_references_a_product_missing_from_the_catalog() {
        let catalog = GroceryDemoDataset::products();
        let stale = GroceryDemoDataset::orders()
            .into_iter()
            .flat_map(|order| order.items)
            .any(|item| !catalog.iter().any(|product| product.id == item.product_id));
        assert!(stale);
    }
}
