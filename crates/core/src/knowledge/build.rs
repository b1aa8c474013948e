//! Batch job that scans the order history and rewrites the knowledge artifacts.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::store::KnowledgeStore;
use crate::domain::order::OrderId;
use crate::errors::{AggregationError, DomainError};
use crate::mining::{AssociationMiner, PopularityAggregator};
use crate::ports::OrderSource;

pub const DEFAULT_ORDER_PAGE_SIZE: u32 = 500;
const TOP_PRODUCTS_IN_REPORT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildJob {
    All,
    Associations,
    Popularity,
}

impl BuildJob {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Associations => "associations",
            Self::Popularity => "popularity",
        }
    }

    fn mines_associations(self) -> bool {
        matches!(self, Self::All | Self::Associations)
    }

    fn aggregates_popularity(self) -> bool {
        matches!(self, Self::All | Self::Popularity)
    }
}

impl std::str::FromStr for BuildJob {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "associations" => Ok(Self::Associations),
            "popularity" => Ok(Self::Popularity),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported build job `{other}` (expected all|associations|popularity)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopProduct {
    pub product_id: String,
    pub name: Option<String>,
    pub units: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub job: BuildJob,
    pub orders_scanned: usize,
    pub associated_products: Option<usize>,
    pub association_pairs: Option<usize>,
    pub popular_products: Option<usize>,
    pub top_products: Vec<TopProduct>,
}

/// Streams settled orders page by page into the miners, then publishes the artifacts.
///
/// With `BuildJob::All` both statistics come from one scan, so they describe the same
/// order population. Nothing is written unless every requested aggregation succeeded.
pub struct KnowledgeBuilder {
    orders: Arc<dyn OrderSource>,
    store: Arc<dyn KnowledgeStore>,
    page_size: u32,
}

impl KnowledgeBuilder {
    pub fn new(orders: Arc<dyn OrderSource>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { orders, store, page_size: DEFAULT_ORDER_PAGE_SIZE }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn build(&self, job: BuildJob) -> Result<BuildReport, AggregationError> {
        info!(event_name = "knowledge.build.start", job = job.as_str(), page_size = self.page_size);

        let mut popularity = job.aggregates_popularity().then(PopularityAggregator::new);
        let mut associations = job.mines_associations().then(AssociationMiner::new);
        let mut cursor: Option<OrderId> = None;
        let mut orders_scanned = 0usize;

        loop {
            let page = self
                .orders
                .settled_orders_page(cursor.as_ref(), self.page_size)
                .await
                .map_err(|error| AggregationError::Source(error.to_string()))?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.id.clone());
            orders_scanned += page.len();

            for order in &page {
                if let Some(aggregator) = popularity.as_mut() {
                    aggregator.observe(order);
                }
                if let Some(miner) = associations.as_mut() {
                    miner.observe(order);
                }
            }

            if page.len() < self.page_size as usize {
                break;
            }
        }

        let popularity = popularity.map(PopularityAggregator::finish).transpose();
        let associations = associations.map(AssociationMiner::finish).transpose();
        let (popularity, associations) = match (popularity, associations) {
            (Ok(popularity), Ok(associations)) => (popularity, associations),
            (Err(error), _) | (_, Err(error)) => {
                warn!(
                    event_name = "knowledge.build.aborted",
                    job = job.as_str(),
                    orders_scanned,
                    error = %error,
                    "knowledge build aborted; previously published artifacts stay authoritative"
                );
                return Err(error);
            }
        };

        if let Some(report) = &associations {
            self.store.write_associations(&report.associations).await?;
        }
        if let Some(report) = &popularity {
            self.store.write_popularity(&report.popularity, &report.names).await?;
        }

        let top_products = popularity
            .as_ref()
            .map(|report| {
                report
                    .popularity
                    .ranked()
                    .into_iter()
                    .take(TOP_PRODUCTS_IN_REPORT)
                    .map(|(product_id, units)| TopProduct {
                        product_id: product_id.to_string(),
                        name: report.names.get(product_id).map(str::to_owned),
                        units,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let report = BuildReport {
            job,
            orders_scanned,
            associated_products: associations
                .as_ref()
                .map(|report| report.associations.product_count()),
            association_pairs: associations.as_ref().map(|report| report.associations.pair_count()),
            popular_products: popularity.as_ref().map(|report| report.popularity.len()),
            top_products,
        };

        info!(
            event_name = "knowledge.build.completed",
            job = job.as_str(),
            orders_scanned,
            associated_products = report.associated_products.unwrap_or(0),
            popular_products = report.popular_products.unwrap_or(0),
            "knowledge artifacts rebuilt"
        );
        Ok(report)
    }
}
