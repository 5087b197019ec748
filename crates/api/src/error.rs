//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, Violation};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, violations) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = match violations {
            Some(violations) => {
                serde_json::json!({ "error": message, "violations": violations })
            }
            None => serde_json::json!({ "error": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String, Option<Vec<Violation>>) {
    let message = err.to_string();
    match err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, message, None),
        DomainError::ValidationFailed(violations) => {
            (StatusCode::UNPROCESSABLE_ENTITY, message, Some(violations))
        }
        DomainError::Conflict(violations) => (StatusCode::CONFLICT, message, Some(violations)),
        DomainError::DuplicateOrderCode(_) => (StatusCode::CONFLICT, message, None),
        DomainError::InvalidQuantity { .. }
        | DomainError::PriceOverflow { .. }
        | DomainError::NoLines => {
            (StatusCode::BAD_REQUEST, message, None)
        }
        DomainError::Store(_) => {
            tracing::error!(error = %message, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
