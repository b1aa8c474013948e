//! Recommendation HTTP API.
//!
//! - `POST /api/recommend/product`   related products for one product
//! - `POST /api/recommend/cart`      suggestions for a whole cart
//! - `GET  /api/recommend/trending`  best sellers, `?limit=`
//! - `GET  /api/recommend/personalized`  "just for you", `?customerId=&limit=`
//! - `POST /api/recommend/refresh`   reload knowledge artifacts
//! - `GET  /api/recommend/status`    readiness probe (reloads artifacts on every call)

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cartwise_core::errors::{ApplicationError, InterfaceError, RecommendationError};
use cartwise_core::knowledge::SnapshotSummary;
use cartwise_core::recommend::{
    CartRecommendation, CartRecommendationRequest, KnowledgeStatus, PersonalizedRecommendation,
    PersonalizedRecommendationRequest, ProductRecommendation, ProductRecommendationRequest,
    RecommendationService, SourceProduct, TrendingProduct,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    service: Arc<RecommendationService>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_product: Option<SourceProduct>,
}

impl<T> Envelope<T> {
    fn list(data: Vec<T>) -> Self {
        Self { success: true, count: data.len(), data, source_product: None }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: &'static str,
    pub snapshot: SnapshotSummary,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: KnowledgeStatus,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<u32>,
}

/// Interface failure rendered as a JSON body with the matching status code.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest { message: message.into(), correlation_id: new_id() })
    }
}

impl From<RecommendationError> for ApiError {
    fn from(error: RecommendationError) -> Self {
        Self(ApplicationError::from(error).into_interface(new_id()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Client errors carry their detail; server-side failures only the generic message.
        let message = if status.is_client_error() {
            self.0.message().to_string()
        } else {
            self.0.user_message().to_string()
        };

        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "recommendation request failed"
            );
        } else {
            info!(
                event_name = "api.request.rejected",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "recommendation request rejected"
            );
        }

        let body = ErrorResponse {
            success: false,
            message,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(service: Arc<RecommendationService>) -> Router {
    Router::new()
        .route("/api/recommend/product", post(recommend_by_product))
        .route("/api/recommend/cart", post(recommend_by_cart))
        .route("/api/recommend/trending", get(trending))
        .route("/api/recommend/personalized", get(personalized))
        .route("/api/recommend/refresh", post(refresh))
        .route("/api/recommend/status", get(status))
        .with_state(ApiState { service })
}

async fn recommend_by_product(
    State(state): State<ApiState>,
    body: Result<Json<ProductRecommendationRequest>, JsonRejection>,
) -> Result<Json<Envelope<ProductRecommendation>>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let result = state.service.recommend_by_product(request).await?;

    let mut envelope = Envelope::list(result.recommendations);
    envelope.source_product = Some(result.source_product);
    Ok(Json(envelope))
}

async fn recommend_by_cart(
    State(state): State<ApiState>,
    body: Result<Json<CartRecommendationRequest>, JsonRejection>,
) -> Result<Json<Envelope<CartRecommendation>>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let recommendations = state.service.recommend_by_cart(request).await?;
    Ok(Json(Envelope::list(recommendations)))
}

async fn trending(
    State(state): State<ApiState>,
    query: Result<Query<TrendingQuery>, QueryRejection>,
) -> Result<Json<Envelope<TrendingProduct>>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let products = state.service.trending(query.limit).await?;
    Ok(Json(Envelope::list(products)))
}

async fn personalized(
    State(state): State<ApiState>,
    query: Result<Query<PersonalizedRecommendationRequest>, QueryRejection>,
) -> Result<Json<Envelope<PersonalizedRecommendation>>, ApiError> {
    let Query(request) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let recommendations = state.service.recommend_personalized(request).await?;
    Ok(Json(Envelope::list(recommendations)))
}

async fn refresh(State(state): State<ApiState>) -> Result<Json<RefreshResponse>, ApiError> {
    let snapshot = state.service.refresh_knowledge().await?;
    Ok(Json(RefreshResponse {
        success: true,
        message: "Recommendation knowledge refreshed",
        snapshot,
    }))
}

async fn status(State(state): State<ApiState>) -> (StatusCode, Json<StatusResponse>) {
    let report = state.service.status().await;
    let ready = report.status == KnowledgeStatus::Ready;

    let payload = StatusResponse {
        success: ready,
        status: report.status,
        message: if ready {
            "Recommendation system is operational"
        } else {
            "Knowledge artifacts unavailable; run `cartwise build`"
        },
        snapshot: report.snapshot,
        error: report.error,
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn new_id() -> String {
    format!("req-{}", Uuid::new_v4())
}
