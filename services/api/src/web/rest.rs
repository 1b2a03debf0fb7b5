//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST resource endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every handler is a thin shell: it extracts the caller, the path id, and the
//! JSON body, then hands them to the generic [`CrudService`]. Collection
//! routes take their parent id from the query string; on `POST` the body may
//! carry it instead.
//!
//! [`CrudService`]: chatbot_builder_core::crud::CrudService

use crate::error::{ApiError, ApiResult};
use crate::web::middleware::{path_id, CurrentCaller, JsonBody, QueryParams, SignedIn};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chatbot_builder_core::chat::ChatReply;
use chatbot_builder_core::domain::{
    Account, Caller, Chatbot, Conversation, Integration, IntegrationType, Message, MessageRole,
    Source, SourceStatus, SourceType,
};
use chatbot_builder_core::payload::parse_uuid;
use chatbot_builder_core::resources::{Parent, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::auth::{SessionResponse, SigninRequest, SignupRequest, UpdateProfileRequest};
use crate::web::chat::ChatBody;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::signin_handler,
        crate::web::auth::signout_handler,
        crate::web::auth::me_handler,
        crate::web::auth::update_me_handler,
        list_chatbots_handler,
        create_chatbot_handler,
        get_chatbot_handler,
        update_chatbot_handler,
        delete_chatbot_handler,
        list_sources_handler,
        create_source_handler,
        get_source_handler,
        update_source_handler,
        delete_source_handler,
        list_conversations_handler,
        create_conversation_handler,
        get_conversation_handler,
        update_conversation_handler,
        delete_conversation_handler,
        list_messages_handler,
        create_message_handler,
        get_message_handler,
        list_integrations_handler,
        create_integration_handler,
        get_integration_handler,
        update_integration_handler,
        delete_integration_handler,
        crate::web::chat::chat_handler,
    ),
    components(
        schemas(
            Account, SignupRequest, SigninRequest, UpdateProfileRequest, SessionResponse,
            Chatbot, Source, SourceType, SourceStatus, Conversation, Message, MessageRole,
            Integration, IntegrationType, ChatbotFields, SourceFields, ConversationFields,
            MessageFields, IntegrationFields, ChatBody, ChatReply, SuccessResponse, ErrorResponse
        )
    ),
    tags(
        (name = "auth", description = "Account signup, signin and profile."),
        (name = "chatbots", description = "Chatbots owned by the signed-in account."),
        (name = "sources", description = "Knowledge sources attached to a chatbot."),
        (name = "conversations", description = "Conversations held with a chatbot."),
        (name = "messages", description = "Append-only messages of a conversation."),
        (name = "integrations", description = "Embedding configurations of a chatbot."),
        (name = "chat", description = "Send a message to a chatbot and receive its reply.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Writable chatbot fields. `name` is required on create; every field is
/// optional on update.
#[derive(Deserialize, ToSchema)]
pub struct ChatbotFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub welcome_message: Option<String>,
    pub instructions: Option<String>,
    pub avatar_url: Option<String>,
    pub primary_color: Option<String>,
    pub model_name: Option<String>,
    /// A number, or a numeric string, between 0 and 1.
    pub temperature: Option<f64>,
    /// A positive integer, or a numeric string.
    pub max_tokens: Option<i32>,
    pub is_public: Option<bool>,
}

/// Writable source fields. The content field must match `type`.
#[derive(Deserialize, ToSchema)]
pub struct SourceFields {
    pub chatbot_id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<SourceType>,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub web_url: Option<String>,
    pub status: Option<SourceStatus>,
    pub error_message: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ConversationFields {
    pub chatbot_id: Option<Uuid>,
    pub title: Option<String>,
    pub visitor_id: Option<String>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

#[derive(Deserialize, ToSchema)]
pub struct MessageFields {
    pub conversation_id: Option<Uuid>,
    pub role: Option<MessageRole>,
    pub content: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub sources: Option<Value>,
}

#[derive(Deserialize, ToSchema)]
pub struct IntegrationFields {
    pub chatbot_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub integration_type: Option<IntegrationType>,
    #[schema(value_type = Option<Object>)]
    pub settings: Option<Value>,
    pub is_active: Option<bool>,
}

/// Parent selector for chatbot-scoped collections.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChatbotScope {
    /// Id of the owning chatbot.
    pub chatbot_id: Option<String>,
}

/// Parent selector for the message collection.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversationScope {
    /// Id of the owning conversation.
    pub conversation_id: Option<String>,
}

//=========================================================================================
// Shared Handler Plumbing
//=========================================================================================

fn required_scope(raw: Option<&str>, key: &str) -> ApiResult<Uuid> {
    let raw = raw.ok_or_else(|| ApiError::bad_request(format!("{key} is required")))?;
    Ok(parse_uuid(raw, key)?)
}

/// Copies a query-string parent id into the body unless the body names one.
fn with_scope(mut body: Value, key: &str, raw: Option<String>) -> Value {
    if let (Value::Object(map), Some(raw)) = (&mut body, raw) {
        map.entry(key.to_string()).or_insert(Value::String(raw));
    }
    body
}

async fn read<R: Resource>(state: &AppState, caller: Caller, raw_id: &str) -> ApiResult<Json<R>> {
    let id = path_id(raw_id)?;
    Ok(Json(state.crud.get::<R>(caller, id).await?))
}

async fn create<R: Resource>(
    state: &AppState,
    caller: Caller,
    body: Value,
) -> ApiResult<(StatusCode, Json<R>)> {
    let created = state.crud.create::<R>(caller, &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<R: Resource>(
    state: &AppState,
    caller: Caller,
    raw_id: &str,
    body: Value,
) -> ApiResult<Json<R>> {
    let id = path_id(raw_id)?;
    Ok(Json(state.crud.update::<R>(caller, id, &body).await?))
}

async fn remove<R: Resource>(
    state: &AppState,
    caller: Caller,
    raw_id: &str,
) -> ApiResult<Json<SuccessResponse>> {
    let id = path_id(raw_id)?;
    state.crud.delete::<R>(caller, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

//=========================================================================================
// Chatbots
//=========================================================================================

/// List the signed-in account's chatbots, newest first.
#[utoipa::path(
    get,
    path = "/chatbots",
    responses(
        (status = 200, description = "The caller's chatbots", body = [Chatbot]),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "chatbots"
)]
pub async fn list_chatbots_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
) -> ApiResult<Json<Vec<Chatbot>>> {
    Ok(Json(state.crud.list::<Chatbot>(signed_in.caller(), Parent::Account).await?))
}

#[utoipa::path(
    post,
    path = "/chatbots",
    request_body = ChatbotFields,
    responses(
        (status = 201, description = "Chatbot created", body = Chatbot),
        (status = 400, description = "Missing name or invalid field", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "chatbots"
)]
pub async fn create_chatbot_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<(StatusCode, Json<Chatbot>)> {
    create::<Chatbot>(&state, signed_in.caller(), body).await
}

/// Fetch one chatbot. Public chatbots are readable without signing in.
#[utoipa::path(
    get,
    path = "/chatbots/{id}",
    params(("id" = Uuid, Path, description = "Chatbot id")),
    responses(
        (status = 200, description = "The chatbot", body = Chatbot),
        (status = 401, description = "Private chatbot requested anonymously", body = ErrorResponse),
        (status = 403, description = "Private chatbot of another account", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "chatbots"
)]
pub async fn get_chatbot_handler(
    State(state): State<Arc<AppState>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> ApiResult<Json<Chatbot>> {
    read::<Chatbot>(&state, caller, &id).await
}

#[utoipa::path(
    put,
    path = "/chatbots/{id}",
    params(("id" = Uuid, Path, description = "Chatbot id")),
    request_body = ChatbotFields,
    responses(
        (status = 200, description = "The updated chatbot", body = Chatbot),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "chatbots"
)]
pub async fn update_chatbot_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<Chatbot>> {
    update::<Chatbot>(&state, signed_in.caller(), &id, body).await
}

/// Delete a chatbot together with its sources, conversations, messages and
/// integrations.
#[utoipa::path(
    delete,
    path = "/chatbots/{id}",
    params(("id" = Uuid, Path, description = "Chatbot id")),
    responses(
        (status = 200, description = "Deleted", body = SuccessResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "chatbots"
)]
pub async fn delete_chatbot_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    remove::<Chatbot>(&state, signed_in.caller(), &id).await
}

//=========================================================================================
// Sources
//=========================================================================================

#[utoipa::path(
    get,
    path = "/sources",
    params(ChatbotScope),
    responses(
        (status = 200, description = "The chatbot's sources, newest first", body = [Source]),
        (status = 400, description = "Missing or invalid chatbot_id", body = ErrorResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "sources"
)]
pub async fn list_sources_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ChatbotScope>,
) -> ApiResult<Json<Vec<Source>>> {
    let chatbot_id = required_scope(scope.chatbot_id.as_deref(), "chatbot_id")?;
    Ok(Json(
        state
            .crud
            .list::<Source>(signed_in.caller(), Parent::Chatbot(chatbot_id))
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/sources",
    params(ChatbotScope),
    request_body = SourceFields,
    responses(
        (status = 201, description = "Source created with status pending", body = Source),
        (
            status = 400,
            description = "Missing field or content not matching type",
            body = ErrorResponse
        ),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "sources"
)]
pub async fn create_source_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ChatbotScope>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<(StatusCode, Json<Source>)> {
    let body = with_scope(body, "chatbot_id", scope.chatbot_id);
    create::<Source>(&state, signed_in.caller(), body).await
}

#[utoipa::path(
    get,
    path = "/sources/{id}",
    params(("id" = Uuid, Path, description = "Source id")),
    responses(
        (status = 200, description = "The source", body = Source),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such source", body = ErrorResponse)
    ),
    tag = "sources"
)]
pub async fn get_source_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<Source>> {
    read::<Source>(&state, signed_in.caller(), &id).await
}

#[utoipa::path(
    put,
    path = "/sources/{id}",
    params(("id" = Uuid, Path, description = "Source id")),
    request_body = SourceFields,
    responses(
        (status = 200, description = "The updated source", body = Source),
        (status = 400, description = "Invalid status or content field", body = ErrorResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such source", body = ErrorResponse)
    ),
    tag = "sources"
)]
pub async fn update_source_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<Source>> {
    update::<Source>(&state, signed_in.caller(), &id, body).await
}

#[utoipa::path(
    delete,
    path = "/sources/{id}",
    params(("id" = Uuid, Path, description = "Source id")),
    responses(
        (status = 200, description = "Deleted", body = SuccessResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such source", body = ErrorResponse)
    ),
    tag = "sources"
)]
pub async fn delete_source_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    remove::<Source>(&state, signed_in.caller(), &id).await
}

//=========================================================================================
// Conversations
//=========================================================================================

/// List a chatbot's conversations, most recently active first.
#[utoipa::path(
    get,
    path = "/conversations",
    params(ChatbotScope),
    responses(
        (status = 200, description = "The chatbot's conversations", body = [Conversation]),
        (status = 400, description = "Missing or invalid chatbot_id", body = ErrorResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "conversations"
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ChatbotScope>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let chatbot_id = required_scope(scope.chatbot_id.as_deref(), "chatbot_id")?;
    Ok(Json(
        state
            .crud
            .list::<Conversation>(signed_in.caller(), Parent::Chatbot(chatbot_id))
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/conversations",
    params(ChatbotScope),
    request_body = ConversationFields,
    responses(
        (status = 201, description = "Conversation created", body = Conversation),
        (status = 400, description = "Missing chatbot_id or invalid field", body = ErrorResponse),
        (status = 403, description = "Private chatbot of another account", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "conversations"
)]
pub async fn create_conversation_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ChatbotScope>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let body = with_scope(body, "chatbot_id", scope.chatbot_id);
    create::<Conversation>(&state, signed_in.caller(), body).await
}

#[utoipa::path(
    get,
    path = "/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "The conversation", body = Conversation),
        (status = 403, description = "Neither participant nor chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such conversation", body = ErrorResponse)
    ),
    tag = "conversations"
)]
pub async fn get_conversation_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    read::<Conversation>(&state, signed_in.caller(), &id).await
}

#[utoipa::path(
    put,
    path = "/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = ConversationFields,
    responses(
        (status = 200, description = "The updated conversation", body = Conversation),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 403, description = "Neither participant nor chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such conversation", body = ErrorResponse)
    ),
    tag = "conversations"
)]
pub async fn update_conversation_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<Conversation>> {
    update::<Conversation>(&state, signed_in.caller(), &id, body).await
}

#[utoipa::path(
    delete,
    path = "/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Deleted with its messages", body = SuccessResponse),
        (status = 403, description = "Neither participant nor chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such conversation", body = ErrorResponse)
    ),
    tag = "conversations"
)]
pub async fn delete_conversation_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    remove::<Conversation>(&state, signed_in.caller(), &id).await
}

//=========================================================================================
// Messages
//=========================================================================================

/// List a conversation's messages, oldest first.
#[utoipa::path(
    get,
    path = "/messages",
    params(ConversationScope),
    responses(
        (status = 200, description = "The conversation's messages", body = [Message]),
        (status = 400, description = "Missing or invalid conversation_id", body = ErrorResponse),
        (status = 403, description = "Neither participant nor chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such conversation", body = ErrorResponse)
    ),
    tag = "messages"
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ConversationScope>,
) -> ApiResult<Json<Vec<Message>>> {
    let conversation_id = required_scope(scope.conversation_id.as_deref(), "conversation_id")?;
    Ok(Json(
        state
            .crud
            .list::<Message>(signed_in.caller(), Parent::Conversation(conversation_id))
            .await?,
    ))
}

/// Append a message without generating a reply.
#[utoipa::path(
    post,
    path = "/messages",
    params(ConversationScope),
    request_body = MessageFields,
    responses(
        (status = 201, description = "Message appended", body = Message),
        (status = 400, description = "Invalid role or empty content", body = ErrorResponse),
        (status = 403, description = "Neither participant nor chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such conversation", body = ErrorResponse)
    ),
    tag = "messages"
)]
pub async fn create_message_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ConversationScope>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let body = with_scope(body, "conversation_id", scope.conversation_id);
    create::<Message>(&state, signed_in.caller(), body).await
}

#[utoipa::path(
    get,
    path = "/messages/{id}",
    params(("id" = Uuid, Path, description = "Message id")),
    responses(
        (status = 200, description = "The message", body = Message),
        (status = 403, description = "Neither participant nor chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such message", body = ErrorResponse)
    ),
    tag = "messages"
)]
pub async fn get_message_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<Message>> {
    read::<Message>(&state, signed_in.caller(), &id).await
}

//=========================================================================================
// Integrations
//=========================================================================================

#[utoipa::path(
    get,
    path = "/integrations",
    params(ChatbotScope),
    responses(
        (
            status = 200,
            description = "The chatbot's integrations, newest first",
            body = [Integration]
        ),
        (status = 400, description = "Missing or invalid chatbot_id", body = ErrorResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "integrations"
)]
pub async fn list_integrations_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ChatbotScope>,
) -> ApiResult<Json<Vec<Integration>>> {
    let chatbot_id = required_scope(scope.chatbot_id.as_deref(), "chatbot_id")?;
    Ok(Json(
        state
            .crud
            .list::<Integration>(signed_in.caller(), Parent::Chatbot(chatbot_id))
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/integrations",
    params(ChatbotScope),
    request_body = IntegrationFields,
    responses(
        (status = 201, description = "Integration created", body = Integration),
        (status = 400, description = "Missing chatbot_id or invalid type", body = ErrorResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such chatbot", body = ErrorResponse)
    ),
    tag = "integrations"
)]
pub async fn create_integration_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    QueryParams(scope): QueryParams<ChatbotScope>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<(StatusCode, Json<Integration>)> {
    let body = with_scope(body, "chatbot_id", scope.chatbot_id);
    create::<Integration>(&state, signed_in.caller(), body).await
}

#[utoipa::path(
    get,
    path = "/integrations/{id}",
    params(("id" = Uuid, Path, description = "Integration id")),
    responses(
        (status = 200, description = "The integration", body = Integration),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such integration", body = ErrorResponse)
    ),
    tag = "integrations"
)]
pub async fn get_integration_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<Integration>> {
    read::<Integration>(&state, signed_in.caller(), &id).await
}

#[utoipa::path(
    put,
    path = "/integrations/{id}",
    params(("id" = Uuid, Path, description = "Integration id")),
    request_body = IntegrationFields,
    responses(
        (status = 200, description = "The updated integration", body = Integration),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such integration", body = ErrorResponse)
    ),
    tag = "integrations"
)]
pub async fn update_integration_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<Integration>> {
    update::<Integration>(&state, signed_in.caller(), &id, body).await
}

#[utoipa::path(
    delete,
    path = "/integrations/{id}",
    params(("id" = Uuid, Path, description = "Integration id")),
    responses(
        (status = 200, description = "Deleted", body = SuccessResponse),
        (status = 403, description = "Not the chatbot owner", body = ErrorResponse),
        (status = 404, description = "No such integration", body = ErrorResponse)
    ),
    tag = "integrations"
)]
pub async fn delete_integration_handler(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    remove::<Integration>(&state, signed_in.caller(), &id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_scope_fills_but_never_overrides_the_body() {
        let body = with_scope(json!({"name": "Doc"}), "chatbot_id", Some("abc".into()));
        assert_eq!(body["chatbot_id"], json!("abc"));

        let body = with_scope(json!({"chatbot_id": "from-body"}), "chatbot_id", Some("abc".into()));
        assert_eq!(body["chatbot_id"], json!("from-body"));
    }

    #[test]
    fn scope_must_be_present_and_valid() {
        assert!(required_scope(None, "chatbot_id").is_err());
        assert!(required_scope(Some("42"), "chatbot_id").is_err());
        assert_eq!(
            required_scope(Some(&Uuid::nil().to_string()), "chatbot_id").unwrap(),
            Uuid::nil()
        );
    }

    #[test]
    fn openapi_document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        let paths = [
            "/chatbots/{id}",
            "/sources",
            "/conversations",
            "/messages",
            "/integrations",
            "/chat",
        ];
        for path in paths {
            assert!(doc.paths.paths.contains_key(path), "{path} missing from the OpenAPI document");
        }
    }
}
