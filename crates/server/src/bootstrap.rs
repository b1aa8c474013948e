use std::sync::Arc;

use cartwise_core::config::{AppConfig, ConfigError};
use cartwise_core::knowledge::{JsonFileKnowledgeStore, KnowledgeCache};
use cartwise_core::recommend::{RecommendationEngine, RecommendationService};
use cartwise_db::{
    connect_with_config, migrations, DbPool, SqlOrderRepository, SqlProductRepository,
};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<RecommendationService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store = Arc::new(JsonFileKnowledgeStore::new(config.knowledge.data_dir.clone()));
    let cache = Arc::new(KnowledgeCache::new(store));

    // A missing or broken snapshot is not fatal: the API answers 503 until a build lands.
    if config.knowledge.preload_on_start {
        match cache.ensure_loaded().await {
            Ok(snapshot) => info!(
                event_name = "system.bootstrap.knowledge_preloaded",
                correlation_id = "bootstrap",
                version = snapshot.version,
                associated_products = snapshot.associations.product_count(),
                popular_products = snapshot.popularity.len(),
                "knowledge snapshot preloaded"
            ),
            Err(error) => warn!(
                event_name = "system.bootstrap.knowledge_unavailable",
                correlation_id = "bootstrap",
                data_dir = %config.knowledge.data_dir.display(),
                error = %error,
                "knowledge snapshot could not be preloaded; run `cartwise build`"
            ),
        }
    }

    let engine = RecommendationEngine::new(cache);
    let catalog = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));
    let service =
        Arc::new(RecommendationService::new(engine, catalog, orders, config.recommendation));

    Ok(Application { config, db_pool, service })
}
