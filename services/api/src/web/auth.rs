//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for account signup, signin, signout, and the
//! caller's own profile.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chatbot_builder_core::domain::Account;
use chatbot_builder_core::ports::PortError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::web::middleware::{session_cookie, JsonBody, SignedIn};
use crate::web::rest::SuccessResponse;
use crate::web::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;
const INVALID_CREDENTIALS: &str = "Invalid email or password";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub account: Account,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn normalized_email(email: Option<&str>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| e.contains('@') && !e.starts_with('@') && !e.ends_with('@'))
}

fn session_cookie_header(config: &Config, session_id: &str, max_age: i64) -> String {
    let secure = if config.cookie_secure { " Secure;" } else { "" };
    format!("session={session_id}; HttpOnly;{secure} SameSite=Lax; Path=/; Max-Age={max_age}")
}

/// Opens a session for the account and returns `(cookie, expires_at)`.
async fn open_session(state: &AppState, account_id: Uuid) -> ApiResult<(String, DateTime<Utc>)> {
    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    let expires_at = Utc::now() + ttl;

    state
        .accounts
        .create_auth_session(&auth_session_id, account_id, expires_at)
        .await?;

    let cookie = session_cookie_header(&state.config, &auth_session_id, ttl.num_seconds());
    Ok((cookie, expires_at))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = Account),
        (status = 400, description = "Invalid email, short password, or email already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalized_email(req.email.as_deref())
        .ok_or_else(|| ApiError::bad_request("A valid email is required"))?;
    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let full_name = req.full_name.unwrap_or_default().trim().to_string();

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?
        .to_string();

    // 2. Create the account
    let account = state
        .accounts
        .create_account(&email, &full_name, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                ApiError::bad_request("An account with this email already exists")
            }
            other => ApiError::Port(other),
        })?;
    info!(account_id = %account.id, "account created");

    // 3. Sign the new account in
    let (cookie, _) = open_session(&state, account.id).await?;

    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(account)))
}

/// POST /auth/signin - Sign in with an existing account
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SigninRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalized_email(req.email.as_deref())
        .ok_or_else(|| ApiError::bad_request(INVALID_CREDENTIALS))?;
    let password = req.password.unwrap_or_default();

    // 1. Look the account up by email
    let credentials = state
        .accounts
        .get_credentials_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::bad_request(INVALID_CREDENTIALS),
            other => ApiError::Port(other),
        })?;

    // 2. Verify the password
    let parsed_hash = PasswordHash::new(&credentials.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Stored password hash is malformed".to_string())
    })?;
    let valid = Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(ApiError::bad_request(INVALID_CREDENTIALS));
    }

    // 3. Open a session
    let (cookie, expires_at) = open_session(&state, credentials.account.id).await?;
    info!(account_id = %credentials.account.id, "signed in");

    let response = SessionResponse {
        account: credentials.account,
        expires_at,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/signout - Invalidate the current session
#[utoipa::path(
    post,
    path = "/auth/signout",
    responses(
        (status = 200, description = "Signed out", body = SuccessResponse)
    ),
    tag = "auth"
)]
pub async fn signout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(auth_session_id) = session_cookie(&headers) {
        if let Err(e) = state.accounts.delete_auth_session(auth_session_id).await {
            error!("Failed to delete auth session: {:?}", e);
        }
    }

    let cookie = session_cookie_header(&state.config, "", 0);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(SuccessResponse { success: true }),
    )
}

/// GET /auth/me - The signed-in account
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The caller's account", body = Account),
        (status = 401, description = "Not signed in")
    ),
    tag = "auth"
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    SignedIn(account_id): SignedIn,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.accounts.get_account(account_id).await?))
}

/// PUT /auth/me - Update the signed-in account's profile
#[utoipa::path(
    put,
    path = "/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "The updated account", body = Account),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not signed in")
    ),
    tag = "auth"
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    SignedIn(account_id): SignedIn,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> ApiResult<Json<Account>> {
    let account = match req.full_name {
        Some(full_name) => {
            state
                .accounts
                .update_full_name(account_id, full_name.trim())
                .await?
        }
        None => state.accounts.get_account(account_id).await?,
    };
    Ok(Json(account))
}
