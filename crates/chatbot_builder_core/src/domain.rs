//! crates/chatbot_builder_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Every entity is serializable because rows travel to and from the datastore
//! gateway as JSON records and are returned to clients unchanged in shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request Context
//=========================================================================================

/// Who is making a request. Resolved once per request from the session cookie
/// and then passed explicitly into every policy and service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Account(Uuid),
}

impl Caller {
    pub fn account_id(&self) -> Option<Uuid> {
        match self {
            Caller::Anonymous => None,
            Caller::Account(id) => Some(*id),
        }
    }

    pub fn is_account(&self, id: Uuid) -> bool {
        self.account_id() == Some(id)
    }
}

//=========================================================================================
// Identity
//=========================================================================================

/// An authenticated end-user identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for signin - contains sensitive data
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account: Account,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Closed Enumerations
//=========================================================================================

/// Error returned when a string does not name a member of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

/// The kind of training content a source holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Pdf,
    Url,
    Text,
}

text_enum!(SourceType, "source type", { Pdf => "pdf", Url => "url", Text => "text" });

impl SourceType {
    /// The single content column populated for this source type.
    pub fn content_field(&self) -> &'static str {
        match self {
            SourceType::Pdf => "file_url",
            SourceType::Url => "web_url",
            SourceType::Text => "content",
        }
    }
}

/// Ingestion status of a source. Advanced by an external ingestion worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

text_enum!(SourceStatus, "source status", {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Error => "error",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

text_enum!(MessageRole, "message role", {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

/// A delivery channel for a chatbot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    Iframe,
    ChatBubble,
    Api,
}

text_enum!(IntegrationType, "integration type", {
    Iframe => "iframe",
    ChatBubble => "chat_bubble",
    Api => "api",
});

//=========================================================================================
// Resources
//=========================================================================================

/// A configured assistant profile owned by an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Chatbot {
    pub id: Uuid,
    pub owner_account_id: Uuid,
    pub name: String,
    pub description: String,
    pub welcome_message: String,
    pub instructions: String,
    pub avatar_url: Option<String>,
    pub primary_color: String,
    pub model_name: String,
    pub temperature: f64,
    pub is_public: bool,
    pub max_tokens: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of training content attached to a chatbot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Source {
    pub id: Uuid,
    pub chatbot_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub web_url: Option<String>,
    pub status: SourceStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A thread of messages tied to one chatbot and one visitor or account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub chatbot_id: Uuid,
    pub account_id: Option<Uuid>,
    pub visitor_id: Option<String>,
    pub title: String,
    pub is_active: bool,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable entry in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[schema(value_type = Option<Object>)]
    pub sources: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Integration {
    pub id: Uuid,
    pub chatbot_id: Uuid,
    #[serde(rename = "type")]
    pub integration_type: IntegrationType,
    #[schema(value_type = Object)]
    pub settings: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_wire_names() {
        assert_eq!("chat_bubble".parse::<IntegrationType>(), Ok(IntegrationType::ChatBubble));
        assert_eq!(IntegrationType::ChatBubble.as_str(), "chat_bubble");
        assert_eq!(
            serde_json::to_value(SourceStatus::Processing).unwrap(),
            serde_json::json!("processing")
        );
    }

    #[test]
    fn wire_names_agree_with_serde() {
        fn check<T>(variants: &[T])
        where
            T: Serialize + FromStr + fmt::Display + PartialEq + fmt::Debug,
            T::Err: fmt::Debug,
        {
            for variant in variants {
                let name = variant.to_string();
                assert_eq!(serde_json::to_value(variant).unwrap(), serde_json::json!(name));
                assert_eq!(&name.parse::<T>().unwrap(), variant);
            }
        }

        check(&[SourceType::Pdf, SourceType::Url, SourceType::Text]);
        check(&[
            SourceStatus::Pending,
            SourceStatus::Processing,
            SourceStatus::Completed,
            SourceStatus::Error,
        ]);
        check(&[MessageRole::User, MessageRole::Assistant, MessageRole::System]);
        check(&[IntegrationType::Iframe, IntegrationType::ChatBubble, IntegrationType::Api]);
    }

    #[test]
    fn unknown_variant_names_the_enum() {
        let err = "video".parse::<SourceType>().unwrap_err();
        assert_eq!(err.to_string(), "'video' is not a valid source type");
    }

    #[test]
    fn source_type_selects_its_content_column() {
        assert_eq!(SourceType::Text.content_field(), "content");
        assert_eq!(SourceType::Pdf.content_field(), "file_url");
        assert_eq!(SourceType::Url.content_field(), "web_url");
    }

    #[test]
    fn caller_matches_only_its_own_account() {
        let id = Uuid::new_v4();
        assert!(Caller::Account(id).is_account(id));
        assert!(!Caller::Account(id).is_account(Uuid::new_v4()));
        assert!(!Caller::Anonymous.is_account(id));
    }
}
