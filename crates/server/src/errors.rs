use axum::response::{IntoResponse, Response};
use common::problem::ProblemDetails;
use common::receipt::{ActionReceipt, ErrorMap};
use models::errors::ModelError;
use service::errors::ServiceError;
use service::validation::validation_errors_map;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

/// Handler failure, rendered as problem details.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request validation failed")]
    Validation(ErrorMap),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ErrorMap::new();
        errors.entry(field.to_string()).or_default().push(message.into());
        Self::Validation(errors)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self::Validation(validation_errors_map(&e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => ProblemDetails::validation(errors).into_response(),
            ApiError::Service(ServiceError::Validation(msg))
            | ApiError::Service(ServiceError::Model(ModelError::Validation(msg))) => {
                ApiError::field("service", msg).into_response()
            }
            ApiError::Service(e) if e.is_not_found() => ActionReceipt::not_found(e.to_string()).into_response(),
            ApiError::Service(e) => {
                error!(error = %e, "key store operation failed");
                let message = match e {
                    ServiceError::Timeout(_) => "key store operation timed out",
                    _ => "key store operation failed",
                };
                ActionReceipt::exception(message).into_response()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("database unavailable: {0}")]
    Database(String),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("key store failed to load: {0}")]
    KeyStore(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
