//! crates/chatbot_builder_core/src/chat.rs
//!
//! The "send a message to a chatbot" flow: resolve the chatbot, create or
//! reuse a conversation, append the user's message, bump the conversation's
//! recency, then append the assistant's reply.
//!
//! The steps run sequentially without a surrounding transaction. If the reply
//! cannot be stored, the user's message stays in place and the caller may
//! resend with the same conversation id.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::crud::{decode, fetch, touch_conversation};
use crate::domain::{Caller, Chatbot, Conversation, Message, MessageRole};
use crate::error::{ServiceError, ServiceResult};
use crate::payload::{self, nullable_text, optional_uuid, required_text, required_uuid};
use crate::ports::{Datastore, Filter, Record, ReplyService};
use crate::resources::{message_record, Resource, DEFAULT_CONVERSATION_TITLE};
use crate::schema::Table;

/// A validated `/chat` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub chatbot_id: Uuid,
    pub message: String,
    pub conversation_id: Option<Uuid>,
    pub visitor_id: Option<String>,
}

impl ChatRequest {
    pub fn from_body(body: &Value) -> ServiceResult<Self> {
        let body = payload::object(body)?;
        Ok(Self {
            chatbot_id: required_uuid(body, "chatbotId", "chatbotId is required")?,
            message: required_text(body, "message", "message is required")?,
            conversation_id: optional_uuid(body, "conversationId")?,
            visitor_id: nullable_text(body, "visitorId")?.flatten(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    /// The assistant's reply text.
    pub message: String,
    pub conversation_id: Uuid,
    /// Id of the stored assistant message.
    pub message_id: Uuid,
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn Datastore>,
    replies: Arc<dyn ReplyService>,
}

impl ChatService {
    pub fn new(store: Arc<dyn Datastore>, replies: Arc<dyn ReplyService>) -> Self {
        Self { store, replies }
    }

    pub async fn send(&self, caller: Caller, request: ChatRequest) -> ServiceResult<ChatReply> {
        let store = self.store.as_ref();

        let chatbot = fetch::<Chatbot>(store, request.chatbot_id).await?;
        // Private chatbots are invisible to everyone but their owner.
        if !chatbot.is_public && !caller.is_account(chatbot.owner_account_id) {
            return Err(ServiceError::NotFound(format!("{} not found", Chatbot::LABEL)));
        }

        let conversation = match request.conversation_id {
            Some(id) => self.existing_conversation(&chatbot, id).await?,
            None => {
                self.open_conversation(caller, &chatbot, request.visitor_id.as_deref())
                    .await?
            }
        };

        let user_record =
            message_record(conversation.id, MessageRole::User, &request.message, Value::Null);
        let user_message: Message = decode(store.insert(Table::Messages, user_record).await?)?;

        touch_conversation(store, conversation.id, user_message.created_at).await?;

        let reply = self
            .replies
            .compose_reply(&chatbot, &conversation, &user_message)
            .await
            .inspect_err(|e| {
                warn!(conversation_id = %conversation.id, error = %e, "reply generation failed")
            })?;

        let assistant_record =
            message_record(conversation.id, MessageRole::Assistant, &reply, Value::Null);
        let assistant_message: Message =
            decode(store.insert(Table::Messages, assistant_record).await?)?;

        info!(
            chatbot_id = %chatbot.id,
            conversation_id = %conversation.id,
            "chat exchange stored"
        );

        Ok(ChatReply {
            message: reply,
            conversation_id: conversation.id,
            message_id: assistant_message.id,
        })
    }

    /// Loads a conversation, treating one that belongs to another chatbot as
    /// missing.
    async fn existing_conversation(
        &self,
        chatbot: &Chatbot,
        id: Uuid,
    ) -> ServiceResult<Conversation> {
        let filter = Filter::by_id(id).eq("chatbot_id", chatbot.id);
        let record = self
            .store
            .select_one(Table::Conversations, &filter)
            .await
            .map_err(ServiceError::not_found_as(Conversation::LABEL))?;
        decode(record)
    }

    async fn open_conversation(
        &self,
        caller: Caller,
        chatbot: &Chatbot,
        visitor_id: Option<&str>,
    ) -> ServiceResult<Conversation> {
        let record: Record = match json!({
            "chatbot_id": chatbot.id,
            "account_id": caller.account_id(),
            "visitor_id": visitor_id,
            "title": DEFAULT_CONVERSATION_TITLE,
            "is_active": true,
            "metadata": {},
        }) {
            Value::Object(map) => map,
            _ => Record::new(),
        };

        let conversation: Conversation =
            decode(self.store.insert(Table::Conversations, record).await?)?;
        info!(conversation_id = %conversation.id, chatbot_id = %chatbot.id, "conversation opened");
        Ok(conversation)
    }
}
