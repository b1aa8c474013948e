use std::sync::Arc;

use cartwise_core::errors::AggregationError;
use cartwise_core::knowledge::{BuildJob, BuildReport, JsonFileKnowledgeStore, KnowledgeBuilder};
use cartwise_db::SqlOrderRepository;

use crate::commands::{build_runtime, load_config, open_database, CommandResult};

pub fn run(job: BuildJob) -> CommandResult {
    let config = match load_config("build") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("build") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let builder = KnowledgeBuilder::new(
            Arc::new(SqlOrderRepository::new(pool.clone())),
            Arc::new(JsonFileKnowledgeStore::new(config.knowledge.data_dir.clone())),
        )
        .with_page_size(config.knowledge.order_page_size);
        let report = builder.build(job).await;
        pool.close().await;

        report.map_err(|error| {
            let (error_class, exit_code) = match &error {
                AggregationError::NoHistory { .. } => ("no_history", 7u8),
                AggregationError::Source(_) => ("order_source", 4u8),
                AggregationError::Store(_) => ("knowledge_store", 8u8),
            };
            (error_class, error.to_string(), exit_code)
        })
    });

    match result {
        Ok(report) => CommandResult::success(
            "build",
            render_report(&report, &config.knowledge.data_dir.display().to_string()),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("build", error_class, message, exit_code)
        }
    }
}

fn render_report(report: &BuildReport, data_dir: &str) -> String {
    let mut parts = vec![format!(
        "built `{}` knowledge from {} settled orders into {data_dir}",
        report.job.as_str(),
        report.orders_scanned
    )];
    if let (Some(products), Some(pairs)) = (report.associated_products, report.association_pairs) {
        parts.push(format!("associations: {products} products, {pairs} pairs"));
    }
    if let Some(products) = report.popular_products {
        parts.push(format!("popularity: {products} products"));
    }
    if !report.top_products.is_empty() {
        let top = report
            .top_products
            .iter()
            .take(5)
            .map(|product| {
                format!(
                    "{} ({})",
                    product.name.as_deref().unwrap_or(&product.product_id),
                    product.units
                )
            })
            .collect::<Vec<_>>();
        parts.push(format!("top sellers: {}", top.join(", ")));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use cartwise_core::knowledge::{BuildJob, BuildReport, TopProduct};

    use super::render_report;

    #[test]
    fn report_lists_only_the_aggregations_that_ran() {
        let report = BuildReport {
            job: BuildJob::Associations,
            orders_scanned: 4,
            associated_products: Some(3),
            association_pairs: Some(2),
            popular_products: None,
            top_products: Vec::new(),
        };

        assert_eq!(
            render_report(&report, "data/knowledge"),
            "built `associations` knowledge from 4 settled orders into data/knowledge; \
             associations: 3 products, 2 pairs"
        );
    }

    #[test]
    fn top_sellers_fall_back_to_product_id_without_a_name() {
        let report = BuildReport {
            job: BuildJob::Popularity,
            orders_scanned: 2,
            associated_products: None,
            association_pairs: None,
            popular_products: Some(2),
            top_products: vec![
                TopProduct { product_id: "milk".to_string(), name: Some("Milk".to_string()), units: 9 },
                TopProduct { product_id: "eggs".to_string(), name: None, units: 4 },
            ],
        };

        assert!(render_report(&report, "kb").ends_with("top sellers: Milk (9), eggs (4)"));
    }
}
