//! services/api/src/web/chat.rs
//!
//! The `/chat` endpoint used by embedded chat widgets.

use axum::{extract::State, Json};
use chatbot_builder_core::chat::{ChatReply, ChatRequest};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::middleware::{CurrentCaller, JsonBody};
use crate::web::rest::ErrorResponse;
use crate::web::state::AppState;

/// Request body of `POST /chat`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub chatbot_id: Uuid,
    pub message: String,
    /// Continue this conversation instead of starting a new one.
    pub conversation_id: Option<Uuid>,
    /// Anonymous widget visitor the new conversation is attributed to.
    pub visitor_id: Option<String>,
}

/// POST /chat - Send a message to a chatbot and receive its reply
///
/// Works without signing in. A private chatbot only answers its owner.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatBody,
    responses(
        (status = 200, description = "The assistant's reply", body = ChatReply),
        (status = 400, description = "Missing chatbotId or message", body = ErrorResponse),
        (status = 404, description = "No such chatbot or conversation", body = ErrorResponse)
    ),
    tag = "chat"
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    CurrentCaller(caller): CurrentCaller,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<ChatReply>> {
    let request = ChatRequest::from_body(&body)?;
    Ok(Json(state.chat.send(caller, request).await?))
}
