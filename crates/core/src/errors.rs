use thiserror::Error;

use crate::domain::product::ProductId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures while reading or writing knowledge artifacts.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KnowledgeError {
    #[error("knowledge artifact `{artifact}` not found at `{location}`")]
    NotFound { artifact: &'static str, location: String },
    #[error("knowledge artifact `{artifact}` is corrupt: {reason}")]
    Corrupt { artifact: &'static str, reason: String },
    #[error("knowledge artifact `{artifact}` i/o failure: {reason}")]
    Io { artifact: &'static str, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no settled orders available for `{job}` aggregation")]
    NoHistory { job: &'static str },
    #[error("order source failure: {0}")]
    Source(String),
    #[error(transparent)]
    Store(#[from] KnowledgeError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("invalid recommendation request: {0}")]
    InvalidRequest(String),
    #[error("product `{0}` not found")]
    ProductNotFound(ProductId),
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error("catalog failure: {0}")]
    Catalog(String),
    #[error("order history failure: {0}")]
    OrderHistory(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Recommendation(#[from] RecommendationError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested product could not be found.",
            Self::ServiceUnavailable { .. } => {
                "Recommendations are temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Recommendation(RecommendationError::InvalidRequest(message)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Recommendation(RecommendationError::ProductNotFound(id)) => {
                Self::NotFound { message: format!("product `{id}` not found"), correlation_id }
            }
            ApplicationError::Recommendation(RecommendationError::Knowledge(error)) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Recommendation(RecommendationError::Catalog(message))
            | ApplicationError::Recommendation(RecommendationError::OrderHistory(message))
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Aggregation(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

impl From<RecommendationError> for InterfaceError {
    fn from(value: RecommendationError) -> Self {
        ApplicationError::from(value).into()
    }
}
