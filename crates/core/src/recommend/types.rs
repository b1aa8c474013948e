//! Request and response types for recommendation queries.

use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::knowledge::SnapshotSummary;

/// A ranked suggestion before catalog enrichment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationCandidate {
    pub product_id: ProductId,
    pub score: f64,
    pub association_count: u32,
    pub popularity: u64,
    pub is_fallback: bool,
    /// Query products that produced the candidate: cart lines or purchased products,
    /// 1 for product queries, 0 for plain fallback.
    pub matches: u32,
    /// Label captured at aggregation time, used only when the catalog has no better name.
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self { product_id: ProductId::new(product_id), quantity }
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecommendationRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
}

impl ProductRecommendationRequest {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self { product_id: Some(product_id.into()), ..Self::default() }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn excluding(mut self, ids: &[&str]) -> Self {
        self.exclude_ids = ids.iter().map(|id| (*id).to_owned()).collect();
        self
    }
}

/// `cart_items` stays optional so a request without a list can be told apart from an empty cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRecommendationRequest {
    #[serde(default)]
    pub cart_items: Option<Vec<CartItem>>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl CartRecommendationRequest {
    pub fn new(cart_items: Vec<CartItem>) -> Self {
        Self { cart_items: Some(cart_items), limit: None }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedRecommendationRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PersonalizedRecommendationRequest {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self { customer_id: Some(customer_id.into()), limit: None }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceProduct {
    pub id: ProductId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecommendation {
    pub product: Product,
    pub score: f64,
    pub association_count: u32,
    pub popularity: u64,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecommendations {
    pub source_product: SourceProduct,
    pub recommendations: Vec<ProductRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRecommendation {
    pub product: Product,
    pub score: f64,
    pub matches: u32,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedRecommendation {
    pub product: Product,
    pub score: f64,
    pub matches: u32,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingProduct {
    pub product: Product,
    pub popularity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnowledgeStatus {
    Ready,
    NotReady,
}

impl KnowledgeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::NotReady => "not-ready",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: KnowledgeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
