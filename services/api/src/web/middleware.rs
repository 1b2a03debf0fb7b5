//! services/api/src/web/middleware.rs
//!
//! Session resolution and the request extractors built on it.
//!
//! [`resolve_caller`] runs on every request and stores a [`Caller`] in the
//! request extensions: the session's account when the `session` cookie names
//! a live session, anonymous otherwise. Handlers then pick it up through
//! [`CurrentCaller`] or, when an account is mandatory, [`SignedIn`].

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use chatbot_builder_core::domain::Caller;
use chatbot_builder_core::ports::PortError;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Reads the auth session id from the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that resolves the auth session cookie into a [`Caller`].
///
/// Missing, unknown, and expired sessions all resolve to an anonymous caller;
/// only a failure of the account store itself aborts the request.
pub async fn resolve_caller(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match session_cookie(req.headers()) {
        None => Caller::Anonymous,
        Some(session_id) => match state.accounts.validate_auth_session(session_id).await {
            Ok(account) => Caller::Account(account.id),
            Err(PortError::Unauthorized | PortError::NotFound(_)) => {
                debug!("session cookie did not resolve to a live session");
                Caller::Anonymous
            }
            Err(e) => return Err(ApiError::Port(e)),
        },
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

//=========================================================================================
// Extractors
//=========================================================================================

/// The resolved caller, possibly anonymous.
#[derive(Debug, Clone, Copy)]
pub struct CurrentCaller(pub Caller);

impl<S> FromRequestParts<S> for CurrentCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentCaller(
            parts.extensions.get::<Caller>().copied().unwrap_or(Caller::Anonymous),
        ))
    }
}

/// The signed-in account. Rejects anonymous callers with `401`.
#[derive(Debug, Clone, Copy)]
pub struct SignedIn(pub Uuid);

impl SignedIn {
    pub fn caller(self) -> Caller {
        Caller::Account(self.0)
    }
}

impl<S> FromRequestParts<S> for SignedIn
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Caller>() {
            Some(Caller::Account(id)) => Ok(SignedIn(*id)),
            _ => Err(ApiError::Unauthenticated),
        }
    }
}

/// A JSON request body whose rejections are reported as `400 {"error": ...}`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| JsonBody(value))
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
    }
}

/// A query string whose rejections are reported as `400 {"error": ...}`.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| QueryParams(value))
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
    }
}

/// Parses a path segment as a resource id.
pub fn path_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::bad_request(format!("'{raw}' is not a valid id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; lang=en"),
        );
        assert_eq!(session_cookie(&headers), Some("abc123"));
    }

    #[test]
    fn empty_or_missing_session_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn path_ids_must_be_uuids() {
        assert!(path_id("not-a-uuid").is_err());
        assert_eq!(path_id(&Uuid::nil().to_string()).unwrap(), Uuid::nil());
    }
}
