//! crates/chatbot_builder_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{Account, AccountCredentials, Chatbot, Conversation, Message};
use crate::schema::Table;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The query matched no row.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Datastore Gateway Vocabulary
//=========================================================================================

/// One row, keyed by column name.
pub type Record = Map<String, Value>;

/// A value a filter column is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Uuid(Uuid),
    Text(String),
    Bool(bool),
}

impl FilterValue {
    /// Whether a JSON cell holds this value.
    pub fn matches(&self, cell: &Value) -> bool {
        match (self, cell) {
            (FilterValue::Uuid(id), Value::String(s)) => Uuid::parse_str(s).is_ok_and(|v| v == *id),
            (FilterValue::Text(t), Value::String(s)) => t == s,
            (FilterValue::Bool(b), Value::Bool(v)) => b == v,
            _ => false,
        }
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Uuid(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// A conjunction of column equalities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(&'static str, FilterValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.conditions.push((column, value.into()));
        self
    }

    pub fn conditions(&self) -> &[(&'static str, FilterValue)] {
        &self.conditions
    }

    pub fn matches(&self, row: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(*column).is_some_and(|cell| value.matches(cell)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self { column, ascending: true }
    }

    pub fn desc(column: &'static str) -> Self {
        Self { column, ascending: false }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Single-table access to the managed relational store.
///
/// Every call touches exactly one table. An empty result from `select_one` or
/// `update` is reported as [`PortError::NotFound`]; any other failure of the
/// store surfaces as [`PortError::Unexpected`].
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn select(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<Order>,
    ) -> PortResult<Vec<Record>>;

    async fn select_one(&self, table: Table, filter: &Filter) -> PortResult<Record>;

    /// Inserts a row. Columns absent from `record` take the store's defaults
    /// (generated id, current timestamps).
    async fn insert(&self, table: Table, record: Record) -> PortResult<Record>;

    /// Merges `patch` into the matching row. Columns absent from `patch` keep
    /// their stored value.
    async fn update(&self, table: Table, filter: &Filter, patch: Record) -> PortResult<Record>;

    async fn delete(&self, table: Table, filter: &Filter) -> PortResult<()>;
}

/// Persistence for the identity collaborator.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        full_name: &str,
        hashed_password: &str,
    ) -> PortResult<Account>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials>;

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account>;

    async fn update_full_name(&self, account_id: Uuid, full_name: &str) -> PortResult<Account>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session to its account. Unknown and expired sessions
    /// fail with [`PortError::Unauthorized`].
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Account>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ReplyService: Send + Sync {
    /// Produces the assistant's answer to the latest user message.
    async fn compose_reply(
        &self,
        chatbot: &Chatbot,
        conversation: &Conversation,
        user_message: &Message,
    ) -> PortResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filter_requires_every_condition() {
        let id = Uuid::new_v4();
        let filter = Filter::by_id(id).eq("is_active", true);

        assert!(filter.matches(&row(json!({"id": id.to_string(), "is_active": true}))));
        assert!(!filter.matches(&row(json!({"id": id.to_string(), "is_active": false}))));
        assert!(!filter.matches(&row(json!({"is_active": true}))));
    }

    #[test]
    fn uuid_filter_ignores_textual_case() {
        let id = Uuid::new_v4();
        let upper = id.to_string().to_uppercase();
        assert!(FilterValue::Uuid(id).matches(&json!(upper)));
        assert!(!FilterValue::Uuid(id).matches(&json!("not-a-uuid")));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&Record::new()));
    }
}
