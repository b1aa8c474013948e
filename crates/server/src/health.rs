use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use cartwise_core::knowledge::SnapshotSummary;
use cartwise_core::recommend::RecommendationService;
use cartwise_db::DbPool;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    service: Arc<RecommendationService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub knowledge: HealthCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotSummary>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, service: Arc<RecommendationService>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, service })
}

/// Liveness probe. Reports the snapshot already in memory and never reloads artifacts;
/// `/api/recommend/status` is the expensive readiness check.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let snapshot = state.service.snapshot_summary().await;
    let ready = database.status == "ready";

    let knowledge = match &snapshot {
        Some(summary) => HealthCheck {
            status: "loaded",
            detail: format!(
                "snapshot v{} loaded at {}",
                summary.version,
                summary.loaded_at.to_rfc3339()
            ),
        },
        None => HealthCheck { status: "cold", detail: "no snapshot loaded yet".to_string() },
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "cartwise-server runtime initialized".to_string(),
        },
        database,
        knowledge,
        snapshot,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
