//! crates/chatbot_builder_core/src/crud.rs
//!
//! The generic CRUD dispatcher shared by every resource.
//!
//! Each operation runs the same pipeline: validate the payload, load the
//! ownership chain, authorize, and only then touch the datastore. A denial
//! always short-circuits before any mutation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Caller, Chatbot, Conversation};
use crate::error::{ServiceError, ServiceResult};
use crate::payload;
use crate::policy::{authorize, Action, Decision, Guard, ResourceKind};
use crate::ports::{Datastore, Filter, PortError, Record};
use crate::resources::{Ownership, Parent, Resource};
use crate::schema::Table;

/// An ownership chain loaded from the datastore.
enum Chain {
    Account,
    Chatbot(Chatbot),
    Conversation(Conversation, Chatbot),
}

impl Chain {
    fn guard(&self) -> Guard<'_> {
        match self {
            Chain::Account => Guard::Account,
            Chain::Chatbot(chatbot) => Guard::Chatbot(chatbot),
            Chain::Conversation(conversation, chatbot) => {
                Guard::Conversation { conversation, chatbot }
            }
        }
    }
}

#[derive(Clone)]
pub struct CrudService {
    store: Arc<dyn Datastore>,
}

impl CrudService {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    pub async fn list<R: Resource>(&self, caller: Caller, parent: Parent) -> ServiceResult<Vec<R>> {
        let chain = self.load_chain(parent).await?;
        check(caller, Action::List, R::KIND, &chain.guard())?;

        let filter = match parent {
            Parent::Account => {
                let owner = caller.account_id().ok_or(ServiceError::Unauthenticated)?;
                Filter::new().eq(R::PARENT_COLUMN, owner)
            }
            Parent::Chatbot(id) | Parent::Conversation(id) => {
                Filter::new().eq(R::PARENT_COLUMN, id)
            }
        };

        self.store
            .select(R::TABLE, &filter, Some(R::LIST_ORDER))
            .await?
            .into_iter()
            .map(decode::<R>)
            .collect()
    }

    pub async fn get<R: Resource>(&self, caller: Caller, id: Uuid) -> ServiceResult<R> {
        let row = fetch::<R>(self.store.as_ref(), id).await?;
        self.authorize_row(caller, Action::Read, &row).await?;
        Ok(row)
    }

    pub async fn create<R: Resource>(&self, caller: Caller, body: &Value) -> ServiceResult<R> {
        let new_row = R::new_row(caller, payload::object(body)?)?;
        let chain = self.load_chain(new_row.parent).await?;
        check(caller, Action::Create, R::KIND, &chain.guard())?;

        let inserted = self.store.insert(R::TABLE, new_row.record).await?;
        if let Parent::Conversation(conversation_id) = new_row.parent {
            let appended_at = created_at(&inserted).unwrap_or_else(Utc::now);
            touch_conversation(self.store.as_ref(), conversation_id, appended_at).await?;
        }

        let created = decode::<R>(inserted)?;
        info!(kind = %R::KIND, id = %created.id(), "created");
        Ok(created)
    }

    /// Partial update: only keys present in `body` are written.
    pub async fn update<R: Resource>(
        &self,
        caller: Caller,
        id: Uuid,
        body: &Value,
    ) -> ServiceResult<R> {
        let mut patch = R::patch(payload::object(body)?)?;
        let current = fetch::<R>(self.store.as_ref(), id).await?;
        self.authorize_row(caller, Action::Update, &current).await?;
        current.check_patch(&patch)?;

        if patch.is_empty() {
            return Ok(current);
        }
        if R::TABLE.has_column("updated_at") {
            patch.insert("updated_at".to_string(), timestamp(Utc::now()));
        }

        let updated = self
            .store
            .update(R::TABLE, &Filter::by_id(id), patch)
            .await
            .map_err(ServiceError::not_found_as(R::LABEL))?;
        info!(kind = %R::KIND, %id, "updated");
        decode::<R>(updated)
    }

    pub async fn delete<R: Resource>(&self, caller: Caller, id: Uuid) -> ServiceResult<()> {
        let current = fetch::<R>(self.store.as_ref(), id).await?;
        self.authorize_row(caller, Action::Delete, &current).await?;

        self.store.delete(R::TABLE, &Filter::by_id(id)).await?;
        info!(kind = %R::KIND, %id, "deleted");
        Ok(())
    }

    async fn load_chain(&self, parent: Parent) -> ServiceResult<Chain> {
        let store = self.store.as_ref();
        match parent {
            Parent::Account => Ok(Chain::Account),
            Parent::Chatbot(id) => Ok(Chain::Chatbot(fetch::<Chatbot>(store, id).await?)),
            Parent::Conversation(id) => {
                let conversation = fetch::<Conversation>(store, id).await?;
                let chatbot = fetch::<Chatbot>(store, conversation.chatbot_id).await?;
                Ok(Chain::Conversation(conversation, chatbot))
            }
        }
    }

    async fn authorize_row<R: Resource>(
        &self,
        caller: Caller,
        action: Action,
        row: &R,
    ) -> ServiceResult<()> {
        match row.ownership() {
            Ownership::Chatbot(chatbot) => check(caller, action, R::KIND, &Guard::Chatbot(chatbot)),
            Ownership::Conversation(conversation) => {
                let chatbot = fetch::<Chatbot>(self.store.as_ref(), conversation.chatbot_id).await?;
                let guard = Guard::Conversation { conversation, chatbot: &chatbot };
                check(caller, action, R::KIND, &guard)
            }
            Ownership::Parent(parent) => {
                let chain = self.load_chain(parent).await?;
                check(caller, action, R::KIND, &chain.guard())
            }
        }
    }
}

fn check(
    caller: Caller,
    action: Action,
    kind: ResourceKind,
    guard: &Guard<'_>,
) -> ServiceResult<()> {
    match authorize(caller, action, kind, guard) {
        Decision::Allow => Ok(()),
        Decision::Deny(_) if caller == Caller::Anonymous => Err(ServiceError::Unauthenticated),
        Decision::Deny(reason) => {
            warn!(?caller, ?action, %kind, "access denied");
            Err(ServiceError::Forbidden(reason))
        }
    }
}

/// Loads one row by id, reporting an empty result as a named not-found.
pub(crate) async fn fetch<R: Resource>(store: &dyn Datastore, id: Uuid) -> ServiceResult<R> {
    let record = store
        .select_one(R::TABLE, &Filter::by_id(id))
        .await
        .map_err(ServiceError::not_found_as(R::LABEL))?;
    decode::<R>(record)
}

pub(crate) fn decode<R: Resource>(record: Record) -> ServiceResult<R> {
    serde_json::from_value(Value::Object(record)).map_err(|e| {
        ServiceError::Port(PortError::Unexpected(format!("malformed {} row: {e}", R::TABLE)))
    })
}

/// Wire format of every stored timestamp: RFC 3339, microseconds, `Z`.
pub fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn created_at(record: &Record) -> Option<DateTime<Utc>> {
    record
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// Bumps a conversation's recency so it never precedes its newest message.
pub(crate) async fn touch_conversation(
    store: &dyn Datastore,
    conversation_id: Uuid,
    not_before: DateTime<Utc>,
) -> ServiceResult<()> {
    let mut patch = Record::new();
    patch.insert("updated_at".to_string(), timestamp(Utc::now().max(not_before)));
    store
        .update(Table::Conversations, &Filter::by_id(conversation_id), patch)
        .await
        .map_err(ServiceError::not_found_as(Conversation::LABEL))?;
    Ok(())
}
