//! crates/chatbot_builder_core/src/resources.rs
//!
//! Per-resource knowledge plugged into the generic CRUD dispatcher: which
//! table a resource lives in, how its ownership is resolved, and how request
//! bodies are validated into insert records and update patches.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{
    Caller, Chatbot, Conversation, Integration, IntegrationType, Message, MessageRole, Source,
    SourceStatus, SourceType,
};
use crate::error::{ServiceError, ServiceResult};
use crate::payload::{
    coerce_max_tokens, coerce_temperature, nullable_text, optional_bool, optional_coerced,
    optional_enum, optional_object, optional_text, required_text, required_uuid, field, Field,
};
use crate::policy::ResourceKind;
use crate::ports::{Order, Record};
use crate::schema::Table;

pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi! I'm a virtual assistant. How can I help you?";
pub const DEFAULT_PRIMARY_COLOR: &str = "#6366F1";
pub const DEFAULT_MODEL_NAME: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i32 = 1000;
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";

/// The row a resource hangs off in the ownership tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// The caller's own account (top-level chatbots).
    Account,
    Chatbot(Uuid),
    Conversation(Uuid),
}

/// How the access-control guard of an existing row is found.
#[derive(Debug, Clone, Copy)]
pub enum Ownership<'a> {
    /// The row is a chatbot and governs itself.
    Chatbot(&'a Chatbot),
    /// The row is a conversation, governed by itself and its chatbot.
    Conversation(&'a Conversation),
    /// The row is governed by a parent that has to be loaded.
    Parent(Parent),
}

/// A validated insert, plus the parent that must authorize it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    pub parent: Parent,
    pub record: Record,
}

pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ResourceKind;
    const TABLE: Table;
    /// Column matched against the parent id when listing.
    const PARENT_COLUMN: &'static str;
    const LIST_ORDER: Order;
    /// Display name used in not-found messages.
    const LABEL: &'static str;

    fn id(&self) -> Uuid;

    fn ownership(&self) -> Ownership<'_>;

    /// Validates a create body into a complete insert record.
    fn new_row(caller: Caller, body: &Record) -> ServiceResult<NewRow>;

    /// Validates an update body into a patch holding only the keys present.
    fn patch(body: &Record) -> ServiceResult<Record>;

    /// Checks a patch against the stored row.
    fn check_patch(&self, _patch: &Record) -> ServiceResult<()> {
        Ok(())
    }
}

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn set(patch: &mut Record, key: &str, value: impl Into<Value>) {
    patch.insert(key.to_string(), value.into());
}

/// Like [`optional_text`], but a present value must not be blank.
fn optional_nonblank(body: &Record, key: &str, blank: &str) -> ServiceResult<Option<String>> {
    match optional_text(body, key)? {
        Some(text) if text.trim().is_empty() => Err(ServiceError::validation(blank)),
        other => Ok(other),
    }
}

//=========================================================================================
// Chatbot
//=========================================================================================

impl Resource for Chatbot {
    const KIND: ResourceKind = ResourceKind::Chatbot;
    const TABLE: Table = Table::Chatbots;
    const PARENT_COLUMN: &'static str = "owner_account_id";
    const LIST_ORDER: Order = Order { column: "created_at", ascending: false };
    const LABEL: &'static str = "Chatbot";

    fn id(&self) -> Uuid {
        self.id
    }

    fn ownership(&self) -> Ownership<'_> {
        Ownership::Chatbot(self)
    }

    fn new_row(caller: Caller, body: &Record) -> ServiceResult<NewRow> {
        let owner = caller.account_id().ok_or(ServiceError::Unauthenticated)?;
        let name = required_text(body, "name", "Chatbot name is required")?;

        let record = json!({
            "owner_account_id": owner,
            "name": name,
            "description": optional_text(body, "description")?.unwrap_or_default(),
            "welcome_message": optional_text(body, "welcome_message")?
                .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
            "instructions": optional_text(body, "instructions")?.unwrap_or_default(),
            "avatar_url": nullable_text(body, "avatar_url")?.flatten(),
            "primary_color": optional_text(body, "primary_color")?
                .unwrap_or_else(|| DEFAULT_PRIMARY_COLOR.to_string()),
            "model_name": optional_text(body, "model_name")?
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            "temperature": optional_coerced(body, "temperature", coerce_temperature)?
                .unwrap_or(DEFAULT_TEMPERATURE),
            "max_tokens": optional_coerced(body, "max_tokens", coerce_max_tokens)?
                .unwrap_or(DEFAULT_MAX_TOKENS),
            "is_public": optional_bool(body, "is_public")?.unwrap_or(false),
        });

        Ok(NewRow { parent: Parent::Account, record: into_record(record) })
    }

    fn patch(body: &Record) -> ServiceResult<Record> {
        let mut patch = Record::new();
        if let Some(name) = optional_nonblank(body, "name", "Chatbot name cannot be empty")? {
            set(&mut patch, "name", name);
        }
        let texts = [
            "description",
            "welcome_message",
            "instructions",
            "primary_color",
            "model_name",
        ];
        for key in texts {
            if let Some(text) = optional_text(body, key)? {
                set(&mut patch, key, text);
            }
        }
        if let Some(avatar_url) = nullable_text(body, "avatar_url")? {
            set(&mut patch, "avatar_url", avatar_url);
        }
        if let Some(temperature) = optional_coerced(body, "temperature", coerce_temperature)? {
            set(&mut patch, "temperature", temperature);
        }
        if let Some(max_tokens) = optional_coerced(body, "max_tokens", coerce_max_tokens)? {
            set(&mut patch, "max_tokens", max_tokens);
        }
        if let Some(is_public) = optional_bool(body, "is_public")? {
            set(&mut patch, "is_public", is_public);
        }
        Ok(patch)
    }
}

//=========================================================================================
// Source
//=========================================================================================

impl Resource for Source {
    const KIND: ResourceKind = ResourceKind::Source;
    const TABLE: Table = Table::Sources;
    const PARENT_COLUMN: &'static str = "chatbot_id";
    const LIST_ORDER: Order = Order { column: "created_at", ascending: false };
    const LABEL: &'static str = "Source";

    fn id(&self) -> Uuid {
        self.id
    }

    fn ownership(&self) -> Ownership<'_> {
        Ownership::Parent(Parent::Chatbot(self.chatbot_id))
    }

    fn new_row(_caller: Caller, body: &Record) -> ServiceResult<NewRow> {
        let chatbot_id = required_uuid(body, "chatbot_id", "chatbot_id is required")?;
        let name = required_text(body, "name", "Source name is required")?;
        let source_type = optional_enum::<SourceType>(body, "type")?.ok_or_else(|| {
            ServiceError::validation("type is required (one of pdf, url, text)")
        })?;

        let content_field = source_type.content_field();
        let content = required_text(
            body,
            content_field,
            &format!("{content_field} is required for {source_type} sources"),
        )?;

        let mut record = into_record(json!({
            "chatbot_id": chatbot_id,
            "name": name,
            "type": source_type.as_str(),
            "content": null,
            "file_url": null,
            "web_url": null,
            "status": SourceStatus::Pending.as_str(),
        }));
        set(&mut record, content_field, content);

        Ok(NewRow { parent: Parent::Chatbot(chatbot_id), record })
    }

    fn patch(body: &Record) -> ServiceResult<Record> {
        let mut patch = Record::new();
        if let Some(name) = optional_nonblank(body, "name", "Source name cannot be empty")? {
            set(&mut patch, "name", name);
        }
        for key in ["content", "file_url", "web_url"] {
            if let Some(text) = optional_nonblank(body, key, &format!("{key} cannot be empty"))? {
                set(&mut patch, key, text);
            }
        }
        if let Some(status) = optional_enum::<SourceStatus>(body, "status")? {
            set(&mut patch, "status", status.as_str());
        }
        if let Some(error_message) = nullable_text(body, "error_message")? {
            set(&mut patch, "error_message", error_message);
        }
        Ok(patch)
    }

    fn check_patch(&self, patch: &Record) -> ServiceResult<()> {
        let allowed = self.source_type.content_field();
        for key in ["content", "file_url", "web_url"] {
            if key != allowed && patch.contains_key(key) {
                return Err(ServiceError::validation(format!(
                    "{key} does not apply to {} sources",
                    self.source_type
                )));
            }
        }
        Ok(())
    }
}

//=========================================================================================
// Conversation
//=========================================================================================

impl Resource for Conversation {
    const KIND: ResourceKind = ResourceKind::Conversation;
    const TABLE: Table = Table::Conversations;
    const PARENT_COLUMN: &'static str = "chatbot_id";
    const LIST_ORDER: Order = Order { column: "updated_at", ascending: false };
    const LABEL: &'static str = "Conversation";

    fn id(&self) -> Uuid {
        self.id
    }

    fn ownership(&self) -> Ownership<'_> {
        Ownership::Conversation(self)
    }

    fn new_row(caller: Caller, body: &Record) -> ServiceResult<NewRow> {
        let chatbot_id = required_uuid(body, "chatbot_id", "chatbot_id is required")?;
        let title = optional_nonblank(body, "title", "title cannot be empty")?
            .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());

        let record = json!({
            "chatbot_id": chatbot_id,
            "account_id": caller.account_id(),
            "visitor_id": nullable_text(body, "visitor_id")?.flatten(),
            "title": title,
            "is_active": true,
            "metadata": optional_object(body, "metadata")?.unwrap_or_else(|| json!({})),
        });

        Ok(NewRow { parent: Parent::Chatbot(chatbot_id), record: into_record(record) })
    }

    fn patch(body: &Record) -> ServiceResult<Record> {
        let mut patch = Record::new();
        if let Some(title) = optional_nonblank(body, "title", "title cannot be empty")? {
            set(&mut patch, "title", title);
        }
        if let Some(is_active) = optional_bool(body, "is_active")? {
            set(&mut patch, "is_active", is_active);
        }
        if let Some(metadata) = optional_object(body, "metadata")? {
            set(&mut patch, "metadata", metadata);
        }
        Ok(patch)
    }
}

//=========================================================================================
// Message
//=========================================================================================

impl Resource for Message {
    const KIND: ResourceKind = ResourceKind::Message;
    const TABLE: Table = Table::Messages;
    const PARENT_COLUMN: &'static str = "conversation_id";
    const LIST_ORDER: Order = Order { column: "created_at", ascending: true };
    const LABEL: &'static str = "Message";

    fn id(&self) -> Uuid {
        self.id
    }

    fn ownership(&self) -> Ownership<'_> {
        Ownership::Parent(Parent::Conversation(self.conversation_id))
    }

    fn new_row(_caller: Caller, body: &Record) -> ServiceResult<NewRow> {
        let conversation_id =
            required_uuid(body, "conversation_id", "conversation_id is required")?;
        let role = optional_enum::<MessageRole>(body, "role")?.ok_or_else(|| {
            ServiceError::validation("role is required (one of user, assistant, system)")
        })?;
        let content = required_text(body, "content", "Message content is required")?;
        let sources = match field(body, "sources") {
            Field::Absent | Field::Null => Value::Null,
            Field::Present(value @ (Value::Array(_) | Value::Object(_))) => value.clone(),
            Field::Present(_) => {
                return Err(ServiceError::validation("sources must be a JSON array or object"))
            }
        };

        Ok(NewRow {
            parent: Parent::Conversation(conversation_id),
            record: message_record(conversation_id, role, &content, sources),
        })
    }

    fn patch(_body: &Record) -> ServiceResult<Record> {
        Err(ServiceError::validation("Messages cannot be modified"))
    }
}

/// Insert record for one message; `created_at` is left to the datastore.
pub fn message_record(
    conversation_id: Uuid,
    role: MessageRole,
    content: &str,
    sources: Value,
) -> Record {
    into_record(json!({
        "conversation_id": conversation_id,
        "role": role.as_str(),
        "content": content,
        "sources": sources,
    }))
}

//=========================================================================================
// Integration
//=========================================================================================

impl Resource for Integration {
    const KIND: ResourceKind = ResourceKind::Integration;
    const TABLE: Table = Table::Integrations;
    const PARENT_COLUMN: &'static str = "chatbot_id";
    const LIST_ORDER: Order = Order { column: "created_at", ascending: false };
    const LABEL: &'static str = "Integration";

    fn id(&self) -> Uuid {
        self.id
    }

    fn ownership(&self) -> Ownership<'_> {
        Ownership::Parent(Parent::Chatbot(self.chatbot_id))
    }

    fn new_row(_caller: Caller, body: &Record) -> ServiceResult<NewRow> {
        let chatbot_id = required_uuid(body, "chatbot_id", "chatbot_id is required")?;
        let integration_type = optional_enum::<IntegrationType>(body, "type")?.ok_or_else(|| {
            ServiceError::validation("type is required (one of iframe, chat_bubble, api)")
        })?;

        let record = json!({
            "chatbot_id": chatbot_id,
            "type": integration_type.as_str(),
            "settings": optional_object(body, "settings")?.unwrap_or_else(|| json!({})),
            "is_active": optional_bool(body, "is_active")?.unwrap_or(true),
        });

        Ok(NewRow { parent: Parent::Chatbot(chatbot_id), record: into_record(record) })
    }

    fn patch(body: &Record) -> ServiceResult<Record> {
        let mut patch = Record::new();
        if let Some(settings) = optional_object(body, "settings")? {
            set(&mut patch, "settings", settings);
        }
        if let Some(is_active) = optional_bool(body, "is_active")? {
            set(&mut patch, "is_active", is_active);
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn body(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn validation_message<T: std::fmt::Debug>(result: ServiceResult<T>) -> String {
        match result {
            Err(ServiceError::Validation(m)) => m,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn chatbot_create_fills_defaults_and_binds_the_owner() {
        let owner = Uuid::new_v4();
        let row = Chatbot::new_row(Caller::Account(owner), &body(json!({"name": "Bot"}))).unwrap();

        assert_eq!(row.parent, Parent::Account);
        assert_eq!(row.record["owner_account_id"], json!(owner));
        assert_eq!(row.record["welcome_message"], json!(DEFAULT_WELCOME_MESSAGE));
        assert_eq!(row.record["temperature"], json!(DEFAULT_TEMPERATURE));
        assert_eq!(row.record["max_tokens"], json!(DEFAULT_MAX_TOKENS));
        assert_eq!(row.record["is_public"], json!(false));
    }

    #[test]
    fn chatbot_create_ignores_a_client_supplied_owner() {
        let owner = Uuid::new_v4();
        let row = Chatbot::new_row(
            Caller::Account(owner),
            &body(json!({"name": "Bot", "owner_account_id": Uuid::new_v4()})),
        )
        .unwrap();
        assert_eq!(row.record["owner_account_id"], json!(owner));
    }

    #[test]
    fn chatbot_create_requires_name_and_account() {
        assert_eq!(
            validation_message(Chatbot::new_row(Caller::Account(Uuid::new_v4()), &body(json!({})))),
            "Chatbot name is required"
        );
        assert!(matches!(
            Chatbot::new_row(Caller::Anonymous, &body(json!({"name": "Bot"}))),
            Err(ServiceError::Unauthenticated)
        ));
    }

    #[test]
    fn chatbot_create_rejects_unparseable_numbers() {
        let caller = Caller::Account(Uuid::new_v4());
        for bad in [json!({"temperature": "hot"}), json!({"max_tokens": "lots"})] {
            let mut fields = body(bad);
            fields.insert("name".to_string(), json!("Bot"));
            assert!(Chatbot::new_row(caller, &fields).is_err());
        }
        let fields = body(json!({"name": "Bot", "temperature": "0.2", "max_tokens": "64"}));
        let row = Chatbot::new_row(caller, &fields).unwrap();
        assert_eq!(row.record["temperature"], json!(0.2));
        assert_eq!(row.record["max_tokens"], json!(64));
    }

    #[test]
    fn chatbot_patch_holds_only_present_keys() {
        let patch = Chatbot::patch(&body(json!({"description": "x"}))).unwrap();
        assert_eq!(patch, body(json!({"description": "x"})));

        let patch = Chatbot::patch(&body(json!({"avatar_url": null, "unknown": 1}))).unwrap();
        assert_eq!(patch, body(json!({"avatar_url": null})));

        assert!(Chatbot::patch(&body(json!({"name": ""}))).is_err());
        assert!(Chatbot::patch(&body(json!({"description": null}))).is_err());
    }

    #[test]
    fn source_create_requires_the_content_matching_its_type() {
        let chatbot_id = Uuid::new_v4();
        assert_eq!(
            validation_message(Source::new_row(
                Caller::Anonymous,
                &body(json!({"chatbot_id": chatbot_id, "name": "Doc", "type": "text"}))
            )),
            "content is required for text sources"
        );
        assert_eq!(
            validation_message(Source::new_row(
                Caller::Anonymous,
                &body(json!({
                    "chatbot_id": chatbot_id,
                    "name": "Doc",
                    "type": "url",
                    "content": "x",
                }))
            )),
            "web_url is required for url sources"
        );
        assert!(Source::new_row(
            Caller::Anonymous,
            &body(json!({"chatbot_id": chatbot_id, "name": "Doc", "type": "video"}))
        )
        .is_err());
    }

    #[test]
    fn source_create_populates_exactly_one_content_column() {
        let chatbot_id = Uuid::new_v4();
        let row = Source::new_row(
            Caller::Anonymous,
            &body(json!({
                "chatbot_id": chatbot_id,
                "name": "Guide",
                "type": "pdf",
                "file_url": "https://cdn.example.com/guide.pdf",
                "content": "ignored",
            })),
        )
        .unwrap();

        assert_eq!(row.parent, Parent::Chatbot(chatbot_id));
        assert_eq!(row.record["file_url"], json!("https://cdn.example.com/guide.pdf"));
        assert_eq!(row.record["content"], Value::Null);
        assert_eq!(row.record["web_url"], Value::Null);
        assert_eq!(row.record["status"], json!("pending"));
    }

    #[test]
    fn source_patch_rejects_foreign_content_fields_and_bad_status() {
        let source = Source {
            id: Uuid::new_v4(),
            chatbot_id: Uuid::new_v4(),
            name: "Doc".into(),
            source_type: SourceType::Text,
            content: Some("hello".into()),
            file_url: None,
            web_url: None,
            status: SourceStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let patch = Source::patch(&body(json!({"web_url": "https://example.com"}))).unwrap();
        assert_eq!(
            validation_message(source.check_patch(&patch)),
            "web_url does not apply to text sources"
        );

        let patch =
            Source::patch(&body(json!({"content": "updated", "status": "processing"}))).unwrap();
        assert!(source.check_patch(&patch).is_ok());

        assert!(Source::patch(&body(json!({"status": "done"}))).is_err());
    }

    #[test]
    fn conversation_create_attributes_the_caller() {
        let account = Uuid::new_v4();
        let chatbot_id = Uuid::new_v4();
        let row = Conversation::new_row(
            Caller::Account(account),
            &body(json!({"chatbot_id": chatbot_id, "visitor_id": "v-1"})),
        )
        .unwrap();

        assert_eq!(row.record["account_id"], json!(account));
        assert_eq!(row.record["visitor_id"], json!("v-1"));
        assert_eq!(row.record["title"], json!(DEFAULT_CONVERSATION_TITLE));
        assert_eq!(row.record["metadata"], json!({}));
        assert_eq!(row.record["is_active"], json!(true));
    }

    #[test]
    fn message_create_validates_role_and_content() {
        let conversation_id = Uuid::new_v4();
        assert!(Message::new_row(
            Caller::Anonymous,
            &body(json!({"conversation_id": conversation_id, "role": "robot", "content": "hi"}))
        )
        .is_err());
        assert_eq!(
            validation_message(Message::new_row(
                Caller::Anonymous,
                &body(json!({"conversation_id": conversation_id, "role": "user", "content": ""}))
            )),
            "Message content is required"
        );
        let row = Message::new_row(
            Caller::Anonymous,
            &body(json!({
                "conversation_id": conversation_id,
                "role": "system",
                "content": "be brief",
            })),
        )
        .unwrap();
        assert_eq!(row.parent, Parent::Conversation(conversation_id));
        assert_eq!(row.record["role"], json!("system"));
    }

    #[test]
    fn integration_create_validates_type_and_defaults() {
        let chatbot_id = Uuid::new_v4();
        assert!(Integration::new_row(
            Caller::Anonymous,
            &body(json!({"chatbot_id": chatbot_id, "type": "email"}))
        )
        .is_err());
        let row = Integration::new_row(
            Caller::Anonymous,
            &body(json!({"chatbot_id": chatbot_id, "type": "chat_bubble"})),
        )
        .unwrap();
        assert_eq!(row.record["settings"], json!({}));
        assert_eq!(row.record["is_active"], json!(true));
    }
}
