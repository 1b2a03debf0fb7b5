//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.
//!
//! Handlers return `Result<T, ApiError>`; the [`IntoResponse`] impl turns every
//! variant into exactly one status code and a `{"error": "..."}` body.
//! Internal failures are logged in full, but clients only see a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatbot_builder_core::error::ServiceError;
use chatbot_builder_core::ports::PortError;
use serde_json::json;
use tracing::{error, warn};

use crate::config::ConfigError;

const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A failure reported by one of the core services.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, self.to_string()),

            ApiError::Service(err) => match err {
                ServiceError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
                ServiceError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
                ServiceError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
                ServiceError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
                ServiceError::Port(port) => port_status(port),
            },
            ApiError::Port(port) => port_status(port),

            ApiError::Config(e) => internal("configuration error", e),
            ApiError::Database(e) => internal("database error", e),
            ApiError::Migration(e) => internal("migration error", e),
            ApiError::Io(e) => internal("io error", e),
            ApiError::Internal(m) => internal("internal server error", m),
        }
    }
}

fn port_status(err: &PortError) -> (StatusCode, String) {
    match err {
        PortError::NotFound(m) => {
            warn!(message = %m, "unmapped not-found from a port");
            (StatusCode::NOT_FOUND, "Resource not found".to_string())
        }
        PortError::Conflict(m) => (StatusCode::BAD_REQUEST, m.clone()),
        PortError::Unauthorized => {
            (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
        }
        PortError::Unexpected(m) => internal("datastore error", m),
    }
}

fn internal(kind: &str, detail: &dyn std::fmt::Display) -> (StatusCode, String) {
    error!(error = %detail, "{kind}");
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn service_errors_map_to_one_status_each() {
        assert_eq!(status(ServiceError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status(ServiceError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ServiceError::Forbidden("no".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(ServiceError::NotFound("gone".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ServiceError::Port(PortError::Unexpected("boom".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status(ApiError::MethodNotAllowed), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ApiError::Internal("password column missing".into());
        let (_, message) = err.status_and_message();
        assert_eq!(message, INTERNAL_MESSAGE);
    }
}
