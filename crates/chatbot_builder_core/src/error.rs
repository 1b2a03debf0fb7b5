//! crates/chatbot_builder_core/src/error.rs
//!
//! The application-level error taxonomy. Every failure of a core service is
//! one of these, and the HTTP layer maps each variant to exactly one status.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// No session, or the operation requires an account.
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated, but not entitled to the resource.
    #[error("{0}")]
    Forbidden(String),

    /// The resource or its parent does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A datastore or collaborator fault.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Maps a datastore "no rows" into a named not-found error, leaving other
    /// port failures untouched.
    pub fn not_found_as(label: &str) -> impl FnOnce(PortError) -> ServiceError + '_ {
        move |err| match err {
            PortError::NotFound(_) => ServiceError::NotFound(format!("{label} not found")),
            other => ServiceError::Port(other),
        }
    }
}
