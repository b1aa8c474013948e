//! API-boundary adapter: validates requests, runs the engine and joins live catalog data.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::engine::RecommendationEngine;
use super::types::{
    CartItem, CartRecommendation, CartRecommendationRequest, KnowledgeStatus,
    PersonalizedRecommendation, PersonalizedRecommendationRequest, ProductRecommendation,
    ProductRecommendationRequest, ProductRecommendations, RecommendationCandidate, SourceProduct,
    StatusReport, TrendingProduct,
};
use crate::config::RecommendationConfig;
use crate::domain::order::CustomerId;
use crate::domain::product::{Product, ProductId};
use crate::errors::RecommendationError;
use crate::knowledge::SnapshotSummary;
use crate::ports::{CatalogReader, OrderSource};

/// Orders of a customer's history that feed "just for you" recommendations.
pub const RECENT_ORDER_WINDOW: u32 = 5;

pub struct RecommendationService {
    engine: RecommendationEngine,
    catalog: Arc<dyn CatalogReader>,
    orders: Arc<dyn OrderSource>,
    limits: RecommendationConfig,
}

impl RecommendationService {
    pub fn new(
        engine: RecommendationEngine,
        catalog: Arc<dyn CatalogReader>,
        orders: Arc<dyn OrderSource>,
        limits: RecommendationConfig,
    ) -> Self {
        Self { engine, catalog, orders, limits }
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    pub async fn recommend_by_product(
        &self,
        request: ProductRecommendationRequest,
    ) -> Result<ProductRecommendations, RecommendationError> {
        let product_id = request
            .product_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ProductId::new)
            .ok_or_else(|| {
                RecommendationError::InvalidRequest("productId is required".to_owned())
            })?;
        let limit = self.resolve_limit(request.limit)?;

        let source = self
            .lookup(&product_id)
            .await?
            .ok_or_else(|| RecommendationError::ProductNotFound(product_id.clone()))?;

        let exclude_ids = request
            .exclude_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(ProductId::new)
            .collect::<Vec<_>>();
        let candidates = self.engine.recommend_for_product(&product_id, limit, &exclude_ids).await?;

        let mut recommendations = Vec::with_capacity(candidates.len());
        for (candidate, product) in self.enrich(candidates).await {
            recommendations.push(ProductRecommendation {
                product,
                score: candidate.score,
                association_count: candidate.association_count,
                popularity: candidate.popularity,
                is_fallback: candidate.is_fallback,
            });
        }

        Ok(ProductRecommendations {
            source_product: SourceProduct { id: source.id, name: source.name },
            recommendations,
        })
    }

    pub async fn trending(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<TrendingProduct>, RecommendationError> {
        let limit = self.resolve_limit(limit)?;
        let candidates = self.engine.trending(limit).await?;

        Ok(self
            .enrich(candidates)
            .await
            .into_iter()
            .map(|(candidate, product)| TrendingProduct {
                product,
                popularity: candidate.popularity,
            })
            .collect())
    }

    pub async fn recommend_by_cart(
        &self,
        request: CartRecommendationRequest,
    ) -> Result<Vec<CartRecommendation>, RecommendationError> {
        let cart = request.cart_items.ok_or_else(|| {
            RecommendationError::InvalidRequest("cartItems array is required".to_owned())
        })?;
        let limit = self.resolve_limit(request.limit)?;
        if cart.is_empty() {
            return Ok(Vec::new());
        }

        let cart = cart
            .into_iter()
            .map(|item| {
                let product_id = item.product_id.as_str().trim();
                if product_id.is_empty() {
                    return Err(RecommendationError::InvalidRequest(
                        "every cart item needs a productId".to_owned(),
                    ));
                }
                Ok(CartItem { product_id: ProductId::new(product_id), quantity: item.quantity })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let candidates = self.engine.recommend_for_cart(&cart, limit).await?;

        Ok(self
            .enrich(candidates)
            .await
            .into_iter()
            .map(|(candidate, product)| CartRecommendation {
                product,
                score: candidate.score,
                matches: candidate.matches,
                is_fallback: candidate.is_fallback,
            })
            .collect())
    }

    /// Recommendations built from the products in the customer's recent orders.
    pub async fn recommend_personalized(
        &self,
        request: PersonalizedRecommendationRequest,
    ) -> Result<Vec<PersonalizedRecommendation>, RecommendationError> {
        let customer = request
            .customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(CustomerId::new)
            .ok_or_else(|| {
                RecommendationError::InvalidRequest("customerId is required".to_owned())
            })?;
        let limit = self.resolve_limit(request.limit)?;

        let orders = self
            .orders
            .recent_customer_orders(&customer, RECENT_ORDER_WINDOW)
            .await
            .map_err(|error| RecommendationError::OrderHistory(error.to_string()))?;
        let purchased = orders
            .iter()
            .flat_map(|order| order.items.iter())
            .filter(|item| !item.product_id.is_blank())
            .map(|item| item.product_id.clone())
            .collect::<BTreeSet<_>>();
        debug!(
            event_name = "recommend.personalized.history",
            customer_id = customer.as_str(),
            orders = orders.len(),
            purchased_products = purchased.len(),
            "customer history loaded"
        );

        let candidates = self.engine.recommend_for_history(&purchased, limit).await?;

        Ok(self
            .enrich(candidates)
            .await
            .into_iter()
            .map(|(candidate, product)| PersonalizedRecommendation {
                product,
                score: candidate.score,
                matches: candidate.matches,
                is_fallback: candidate.is_fallback,
            })
            .collect())
    }

    pub async fn refresh_knowledge(&self) -> Result<SnapshotSummary, RecommendationError> {
        let snapshot = self.engine.refresh().await?;
        info!(
            event_name = "recommend.knowledge.refreshed",
            version = snapshot.version,
            "knowledge refreshed on request"
        );
        Ok(snapshot.summary())
    }

    /// Reloads every artifact and reports readiness. Each call costs a full refresh.
    pub async fn status(&self) -> StatusReport {
        match self.engine.refresh().await {
            Ok(snapshot) => StatusReport {
                status: KnowledgeStatus::Ready,
                snapshot: Some(snapshot.summary()),
                error: None,
            },
            Err(error) => StatusReport {
                status: KnowledgeStatus::NotReady,
                snapshot: None,
                error: Some(error.to_string()),
            },
        }
    }

    /// Summary of the snapshot being served right now; never touches the store.
    pub async fn snapshot_summary(&self) -> Option<SnapshotSummary> {
        self.engine.cache().current().await.map(|snapshot| snapshot.summary())
    }

    fn resolve_limit(&self, requested: Option<u32>) -> Result<usize, RecommendationError> {
        let limit = requested.unwrap_or(self.limits.default_limit);
        if limit == 0 || limit > self.limits.max_limit {
            return Err(RecommendationError::InvalidRequest(format!(
                "limit must be between 1 and {}",
                self.limits.max_limit
            )));
        }
        Ok(limit as usize)
    }

    async fn lookup(&self, product_id: &ProductId) -> Result<Option<Product>, RecommendationError> {
        self.catalog
            .find_product(product_id)
            .await
            .map_err(|error| RecommendationError::Catalog(error.to_string()))
    }

    /// Joins candidates with the live catalog, dropping any the catalog cannot resolve or
    /// has deactivated.
    async fn enrich(
        &self,
        candidates: Vec<RecommendationCandidate>,
    ) -> Vec<(RecommendationCandidate, Product)> {
        let mut seen = HashSet::new();
        let mut enriched = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if !seen.insert(candidate.product_id.clone()) {
                continue;
            }
            match self.catalog.find_product(&candidate.product_id).await {
                Ok(Some(product)) if !product.active => {
                    debug!(
                        event_name = "recommend.enrich.inactive_product",
                        product_id = %candidate.product_id,
                        "candidate deactivated in catalog; dropped"
                    );
                }
                Ok(Some(mut product)) => {
                    if product.name.trim().is_empty() {
                        if let Some(label) = candidate.name.clone() {
                            product.name = label;
                        }
                    }
                    enriched.push((candidate, product));
                }
                Ok(None) => {
                    debug!(
                        event_name = "recommend.enrich.missing_product",
                        product_id = %candidate.product_id,
                        "candidate no longer in catalog; dropped"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "recommend.enrich.lookup_failed",
                        product_id = %candidate.product_id,
                        error = %error,
                        "catalog lookup failed; candidate dropped"
                    );
                }
            }
        }

        enriched
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::RecommendationService;
    use crate::config::RecommendationConfig;
    use crate::domain::order::{CustomerId, Order, OrderId, OrderItem, OrderStatus};
    use crate::domain::product::{Product, ProductId};
    use crate::errors::{ApplicationError, RecommendationError};
    use crate::knowledge::{
        AssociationMap, InMemoryKnowledgeStore, KnowledgeCache, KnowledgeSnapshot, KnowledgeStore,
        PopularityMap, ProductNameIndex,
    };
    use crate::ports::{CatalogReader, OrderSource};
    use crate::recommend::{
        CartItem, CartRecommendationRequest, KnowledgeStatus, PersonalizedRecommendationRequest,
        ProductRecommendationRequest, RecommendationEngine,
    };

    const BROKEN: &str = "broken";
    const OFFLINE_CUSTOMER: &str = "cust-offline";

    /// Orders are kept newest first, the order `recent_customer_orders` promises.
    struct CustomerHistory {
        orders: Vec<Order>,
    }

    #[async_trait]
    impl OrderSource for CustomerHistory {
        async fn settled_orders_page(
            &self,
            _: Option<&OrderId>,
            _: u32,
        ) -> Result<Vec<Order>, ApplicationError> {
            Ok(Vec::new())
        }

        async fn recent_customer_orders(
            &self,
            customer: &CustomerId,
            limit: u32,
        ) -> Result<Vec<Order>, ApplicationError> {
            if customer.as_str() == OFFLINE_CUSTOMER {
                return Err(ApplicationError::Persistence("orders offline".to_owned()));
            }
            Ok(self
                .orders
                .iter()
                .filter(|order| &order.customer_id == customer)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn history() -> CustomerHistory {
        let order = |id: &str, customer: &str, products: &[&str]| Order {
            id: OrderId(id.to_owned()),
            customer_id: CustomerId::new(customer),
            status: OrderStatus::Delivered,
            items: products
                .iter()
                .map(|product| OrderItem {
                    product_id: ProductId::new(*product),
                    name: (*product).to_owned(),
                    quantity: 1,
                })
                .collect(),
            created_at: Utc::now(),
        };
        CustomerHistory {
            orders: vec![
                order("o-2", "cust-cook", &["pasta"]),
                order("o-1", "cust-cook", &["pasta", "milk"]),
            ],
        }
    }

    struct StaticCatalog {
        products: HashMap<ProductId, Product>,
    }

    #[async_trait]
    impl CatalogReader for StaticCatalog {
        async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, ApplicationError> {
            if id.as_str() == BROKEN {
                return Err(ApplicationError::Persistence("catalog offline".to_owned()));
            }
            Ok(self.products.get(id).cloned())
        }
    }

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            price: Decimal::new(199, 2),
            image: format!("/images/{id}.png"),
            stock: 10,
            category: "pantry".to_owned(),
            active: true,
        }
    }

    fn id(value: &str) -> ProductId {
        ProductId::new(value)
    }

    fn knowledge() -> KnowledgeSnapshot {
        let mut associations = AssociationMap::new();
        associations.record_pair(&id("pasta"), &id("sauce"));
        associations.record_pair(&id("pasta"), &id("sauce"));
        associations.record_pair(&id("pasta"), &id("retired"));
        associations.record_pair(&id("pasta"), &id(BROKEN));
        associations.record_pair(&id("pasta"), &id("basil"));

        let mut popularity = PopularityMap::new();
        let mut names = ProductNameIndex::new();
        for (product, units) in
            [("milk", 30), ("retired", 20), ("pasta", 10), ("sauce", 6), ("basil", 2), (BROKEN, 1)]
        {
            popularity.add(&id(product), units);
            names.observe(&id(product), &format!("{product} (label)"));
        }
        KnowledgeSnapshot::new(associations, popularity, names)
    }

    fn service_with(
        store: Arc<dyn KnowledgeStore>,
        catalog: Vec<Product>,
    ) -> RecommendationService {
        let cache = Arc::new(KnowledgeCache::new(store));
        let catalog = StaticCatalog {
            products: catalog.into_iter().map(|product| (product.id.clone(), product)).collect(),
        };
        RecommendationService::new(
            RecommendationEngine::new(cache),
            Arc::new(catalog),
            Arc::new(history()),
            RecommendationConfig { default_limit: 10, max_limit: 50 },
        )
    }

    fn service() -> RecommendationService {
        service_with(
            Arc::new(InMemoryKnowledgeStore::with_snapshot(knowledge())),
            vec![
                product("pasta", "Penne"),
                product("sauce", "Tomato Sauce"),
                product("basil", ""),
                product("milk", "Whole Milk"),
            ],
        )
    }

    #[tokio::test]
    async fn product_recommendations_are_enriched_and_filtered() {
        let result = service()
            .recommend_by_product(ProductRecommendationRequest::new("pasta"))
            .await
            .expect("recommendations");

        assert_eq!(result.source_product.id, id("pasta"));
        assert_eq!(result.source_product.name, "Penne");
        let names =
            result.recommendations.iter().map(|rec| rec.product.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Tomato Sauce", "basil (label)"]);
        assert_eq!(result.recommendations[0].association_count, 2);
    }

    #[tokio::test]
    async fn blank_product_id_is_rejected() {
        let error = service()
            .recommend_by_product(ProductRecommendationRequest::new("   "))
            .await
            .expect_err("blank id");
        assert!(matches!(error, RecommendationError::InvalidRequest(_)));

        let error = service()
            .recommend_by_product(ProductRecommendationRequest::default())
            .await
            .expect_err("missing id");
        assert!(matches!(error, RecommendationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let error = service()
            .recommend_by_product(ProductRecommendationRequest::new("caviar"))
            .await
            .expect_err("not in catalog");
        assert_eq!(error, RecommendationError::ProductNotFound(id("caviar")));
    }

    #[tokio::test]
    async fn limit_outside_bounds_is_rejected() {
        let service = service();
        for limit in [0, 51] {
            let error = service.trending(Some(limit)).await.expect_err("out of bounds");
            assert!(matches!(error, RecommendationError::InvalidRequest(_)));
        }
        assert!(service.trending(Some(50)).await.is_ok());
    }

    #[tokio::test]
    async fn trending_skips_products_missing_from_catalog() {
        let trending = service().trending(None).await.expect("trending");

        let ids = trending.iter().map(|item| item.product.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["milk", "pasta", "sauce", "basil"]);
        assert_eq!(trending[0].popularity, 30);
    }

    #[tokio::test]
    async fn cart_requires_a_list_but_accepts_an_empty_one() {
        let service = service();

        let error = service
            .recommend_by_cart(CartRecommendationRequest::default())
            .await
            .expect_err("no list");
        assert!(matches!(error, RecommendationError::InvalidRequest(_)));

        let empty = service
            .recommend_by_cart(CartRecommendationRequest::new(Vec::new()))
            .await
            .expect("empty");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn cart_recommendations_report_matches() {
        let result = service()
            .recommend_by_cart(CartRecommendationRequest::new(vec![CartItem::new("pasta", 2)]))
            .await
            .expect("cart");

        assert_eq!(result[0].product.id, id("sauce"));
        assert_eq!(result[0].matches, 1);
        assert!(!result[0].is_fallback);
        assert!(result.iter().all(|rec| rec.product.id != id("pasta")));
    }

    #[tokio::test]
    async fn status_reports_not_ready_until_artifacts_exist() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let service = service_with(store.clone(), vec![product("milk", "Whole Milk")]);

        let report = service.status().await;
        assert_eq!(report.status, KnowledgeStatus::NotReady);
        assert!(report.error.is_some());
        assert!(service.snapshot_summary().await.is_none());

        store.write_associations(&AssociationMap::new()).await.expect("write");
        store
            .write_popularity(&PopularityMap::new(), &ProductNameIndex::new())
            .await
            .expect("write");

        let report = service.status().await;
        assert_eq!(report.status, KnowledgeStatus::Ready);
        assert_eq!(report.snapshot.map(|summary| summary.version), Some(1));
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn knowledge_failures_surface_as_knowledge_errors() {
        let service = service_with(
            Arc::new(InMemoryKnowledgeStore::default()),
            vec![product("milk", "Whole Milk")],
        );

        let error = service.trending(None).await.expect_err("nothing published");
        assert!(matches!(error, RecommendationError::Knowledge(_)));
    }

    #[tokio::test]
    async fn inactive_catalog_products_are_not_recommended() {
        let mut sauce = product("sauce", "Tomato Sauce");
        sauce.active = false;
        let service = service_with(
            Arc::new(InMemoryKnowledgeStore::with_snapshot(knowledge())),
            vec![product("pasta", "Penne"), sauce, product("basil", "Basil")],
        );

        let result = service
            .recommend_by_product(ProductRecommendationRequest::new("pasta"))
            .await
            .expect("recommendations");

        let ids =
            result.recommendations.iter().map(|rec| rec.product.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["basil"]);
    }

    #[tokio::test]
    async fn personalized_recommendations_follow_recent_purchases() {
        let result = service()
            .recommend_personalized(PersonalizedRecommendationRequest::new("cust-cook"))
            .await
            .expect("personalized");

        let ids = result.iter().map(|rec| rec.product.id.as_str()).collect::<Vec<_>>();
        // milk has no associations, so its trending list adds to the pasta associations.
        assert_eq!(ids, vec!["sauce", "basil"]);
        assert!(result.iter().all(|rec| rec.matches == 2 && !rec.is_fallback));
    }

    #[tokio::test]
    async fn customer_without_orders_gets_trending_products() {
        let request = PersonalizedRecommendationRequest::new("cust-new").with_limit(3);
        let result = service()
            .recommend_personalized(request)
            .await
            .expect("trending");

        let ids = result.iter().map(|rec| rec.product.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["milk", "pasta"]);
        assert!(result.iter().all(|rec| rec.is_fallback));
    }

    #[tokio::test]
    async fn personalized_requests_validate_customer_and_surface_history_failures() {
        let service = service();

        let error = service
            .recommend_personalized(PersonalizedRecommendationRequest::new(" "))
            .await
            .expect_err("blank customer");
        assert!(matches!(error, RecommendationError::InvalidRequest(_)));

        let error = service
            .recommend_personalized(PersonalizedRecommendationRequest::new(OFFLINE_CUSTOMER))
            .await
            .expect_err("history offline");
        assert!(matches!(error, RecommendationError::OrderHistory(_)));
    }
}
