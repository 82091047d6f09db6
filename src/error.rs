//! Error handling module
//!
//! Provides unified error types for the governance core and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed input, raised before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A proposal cannot be resolved by its own submitter ({0})")]
    SelfApproval(String),

    #[error("Proposal {0} has already been resolved")]
    AlreadyResolved(String),

    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    /// Concurrent numbering allocation collided; the whole operation may be retried
    #[error("Numbering conflict: {0}")]
    NumberingConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Only numbering conflicts warrant an automatic retry of the whole apply.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::NumberingConflict(_))
    }

    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::SelfApproval(_) => "SELF_APPROVAL",
            AppError::AlreadyResolved(_) => "ALREADY_RESOLVED",
            AppError::DanglingReference(_) => "DANGLING_REFERENCE",
            AppError::NumberingConflict(_) => "NUMBERING_CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            AppError::Validation(msg) | AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }
            // Surfaced verbatim: the caller must see exactly why the transition was refused
            AppError::SelfApproval(_) => (StatusCode::FORBIDDEN, self.to_string(), None),
            AppError::AlreadyResolved(_) => (StatusCode::CONFLICT, self.to_string(), None),
            AppError::DanglingReference(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg.clone(), None)
            }
            AppError::NumberingConflict(msg) => (
                StatusCode::CONFLICT,
                "Concurrent numbering change, please retry".to_string(),
                Some(msg.clone()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A configuration error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(self.code().to_string()),
            retryable: self.is_retryable(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}

/// Helper function to create a conflict error
pub fn conflict_error(msg: impl Into<String>) -> AppError {
    AppError::NumberingConflict(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_numbering_conflict_is_retryable() {
        assert!(AppError::NumberingConflict("section 3.0".into()).is_retryable());
        assert!(!AppError::AlreadyResolved("x".into()).is_retryable());
        assert!(!AppError::SelfApproval("x".into()).is_retryable());
        assert!(!AppError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn test_error_response_status() {
        let response = AppError::SelfApproval("alice".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AppError::NumberingConflict("3.0".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::DanglingReference("definition".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
