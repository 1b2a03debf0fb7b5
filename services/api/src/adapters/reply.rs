//! services/api/src/adapters/reply.rs
//!
//! The reply adapter behind `/chat`. It implements the `ReplyService` port
//! from the `core` crate with a fixed sample answer naming the chatbot;
//! a model-backed adapter plugs in behind the same port.

use async_trait::async_trait;
use chatbot_builder_core::domain::{Chatbot, Conversation, Message};
use chatbot_builder_core::ports::{PortResult, ReplyService};
use tracing::debug;

const REPLY_TEMPLATE: &str = "This is a sample reply from the chatbot \"{name}\". \
    In a full deployment this answer would be generated by an AI model \
    grounded in the chatbot's sources.";

#[derive(Clone, Default)]
pub struct PlaceholderReplyAdapter;

impl PlaceholderReplyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReplyService for PlaceholderReplyAdapter {
    async fn compose_reply(
        &self,
        chatbot: &Chatbot,
        conversation: &Conversation,
        user_message: &Message,
    ) -> PortResult<String> {
        debug!(
            conversation_id = %conversation.id,
            message_id = %user_message.id,
            model = %chatbot.model_name,
            "composing placeholder reply"
        );
        Ok(REPLY_TEMPLATE.replace("{name}", &chatbot.name))
    }
}
