//! API Error Types
//!
//! Maps hub and request errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::hub::HubError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Hub rejected the operation
    #[error(transparent)]
    Hub(#[from] HubError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Hub(e) => match e {
                HubError::UnknownRole(_)
                | HubError::InvalidEventName(_)
                | HubError::InvalidRoom(_)
                | HubError::InvalidIdentity(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                HubError::ConnectionNotFound(_) => (StatusCode::NOT_FOUND, "CONNECTION_NOT_FOUND"),
                HubError::ConnectionLimitReached(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "CONNECTION_LIMIT")
                }
                HubError::SlowConsumer(_) => (StatusCode::SERVICE_UNAVAILABLE, "SLOW_CONSUMER"),
                HubError::NotAuthenticated | HubError::JoinDenied(_) => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN")
                }
                HubError::DuplicateConnection(_) | HubError::IdentityImmutable(_) => {
                    (StatusCode::CONFLICT, "CONFLICT")
                }
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
