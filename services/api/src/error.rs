//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use notes_core::{PortError, ProfileError, StoreError};
use serde::Serialize;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// A notes store operation failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A profile or avatar operation failed.
    #[error("{0}")]
    Profile(#[from] ProfileError),

    /// The request itself was malformed.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No signed-in user.
    #[error("Authentication required")]
    Unauthorized,

    /// Failed to build the backend HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Port(e) => port_parts(e),
            ApiError::Store(e) => match e {
                StoreError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
                StoreError::Remote(e) => port_parts(e),
                StoreError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                StoreError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
                StoreError::MutationInFlight(_) => (StatusCode::CONFLICT, "mutation_in_flight"),
            },
            ApiError::Profile(e) => match e {
                ProfileError::NotSignedIn => (StatusCode::UNAUTHORIZED, "unauthorized"),
                ProfileError::NoFileSelected
                | ProfileError::MissingExtension(_)
                | ProfileError::InvalidExtension(_) => {
                    (StatusCode::BAD_REQUEST, "bad_request")
                }
                ProfileError::Port(e) => port_parts(e),
            },
            ApiError::Config(_) | ApiError::Http(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

fn port_parts(error: &PortError) -> (StatusCode, &'static str) {
    match error {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
        PortError::Rejected(_) => (StatusCode::BAD_REQUEST, "rejected"),
        PortError::Unexpected(_) => (StatusCode::BAD_GATEWAY, "backend_error"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();
        let details = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            // Internal details stay in the log.
            match status {
                StatusCode::INTERNAL_SERVER_ERROR => None,
                _ => Some(self.to_string()),
            }
        } else {
            Some(self.to_string())
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = Result<T, ApiError>;
