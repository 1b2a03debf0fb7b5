pub mod auth;
pub mod chat;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::error::ApiError;
use auth::{me_handler, signin_handler, signout_handler, signup_handler, update_me_handler};
use rest::*;
use state::AppState;

pub use middleware::resolve_caller;

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Builds the complete application router: API routes, Swagger UI, session
/// resolution, request tracing and CORS.
pub fn router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = state.config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/signin", post(signin_handler))
        .route("/auth/signout", post(signout_handler))
        .route("/auth/me", get(me_handler).put(update_me_handler))
        .route("/chatbots", get(list_chatbots_handler).post(create_chatbot_handler))
        .route(
            "/chatbots/{id}",
            get(get_chatbot_handler)
                .put(update_chatbot_handler)
                .delete(delete_chatbot_handler),
        )
        .route("/sources", get(list_sources_handler).post(create_source_handler))
        .route(
            "/sources/{id}",
            get(get_source_handler)
                .put(update_source_handler)
                .delete(delete_source_handler),
        )
        .route(
            "/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route(
            "/conversations/{id}",
            get(get_conversation_handler)
                .put(update_conversation_handler)
                .delete(delete_conversation_handler),
        )
        .route("/messages", get(list_messages_handler).post(create_message_handler))
        .route("/messages/{id}", get(get_message_handler))
        .route(
            "/integrations",
            get(list_integrations_handler).post(create_integration_handler),
        )
        .route(
            "/integrations/{id}",
            get(get_integration_handler)
                .put(update_integration_handler)
                .delete(delete_integration_handler),
        )
        .route("/chat", post(chat::chat_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(axum_middleware::from_fn_with_state(state.clone(), resolve_caller))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}
