//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `Datastore` and `AccountStore` ports.
//!
//! It mirrors what the PostgreSQL schema guarantees: generated ids and
//! timestamps, unknown columns rejected, parent rows required on insert, and
//! deletes cascading to child tables. Selected with `DATABASE_URL=memory` and
//! used by the test-suite.

use async_trait::async_trait;
use chatbot_builder_core::domain::{Account, AccountCredentials, AuthSession};
use chatbot_builder_core::ports::{
    AccountStore, Datastore, Filter, Order, PortError, PortResult, Record,
};
use chatbot_builder_core::schema::Table;
use chatbot_builder_core::crud::timestamp;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    rows: HashMap<Table, Vec<Record>>,
    accounts: Vec<AccountCredentials>,
    sessions: HashMap<String, AuthSession>,
    last_tick: Option<DateTime<Utc>>,
}

impl State {
    /// A strictly increasing clock, so rows created back to back still sort
    /// in creation order.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let at = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(at);
        at
    }

    fn table(&self, table: Table) -> &[Record] {
        self.rows.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn exists(&self, table: Table, id: &Value) -> bool {
        let Some(id) = id.as_str().and_then(|s| Uuid::parse_str(s).ok()) else {
            return false;
        };
        let filter = Filter::by_id(id);
        self.table(table).iter().any(|row| filter.matches(row))
    }

    /// Removes matching rows and, recursively, every row that hangs off them.
    fn remove(&mut self, table: Table, filter: &Filter) {
        let rows = self.rows.entry(table).or_default();
        let (removed, kept): (Vec<Record>, Vec<Record>) =
            rows.drain(..).partition(|row| filter.matches(row));
        *rows = kept;

        for row in removed {
            let id = row.get("id").and_then(Value::as_str).map(Uuid::parse_str);
            let Some(Ok(id)) = id else {
                continue;
            };
            for (child, fk) in table.cascades_to() {
                self.remove(child, &Filter::new().eq(fk, id));
            }
        }
    }
}

/// In-process datastore backed by a single lock.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_columns(table: Table, record: &Record) -> PortResult<()> {
    match record.keys().find(|key| !table.has_column(key)) {
        Some(key) => Err(PortError::Unexpected(format!(
            "column \"{key}\" of relation \"{table}\" does not exist"
        ))),
        None => Ok(()),
    }
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn select(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<Order>,
    ) -> PortResult<Vec<Record>> {
        let state = self.state.read().await;
        let mut rows: Vec<Record> = state
            .table(table)
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ordering = compare_cells(a.get(order.column), b.get(order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        Ok(rows)
    }

    async fn select_one(&self, table: Table, filter: &Filter) -> PortResult<Record> {
        let state = self.state.read().await;
        state
            .table(table)
            .iter()
            .find(|row| filter.matches(row))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("no matching row in {table}")))
    }

    async fn insert(&self, table: Table, mut record: Record) -> PortResult<Record> {
        check_columns(table, &record)?;
        let mut state = self.state.write().await;

        if let Some((fk, parent)) = table.parent() {
            let parent_id = record.get(fk).cloned().unwrap_or(Value::Null);
            if !state.exists(parent, &parent_id) {
                return Err(PortError::Unexpected(format!(
                    "insert on \"{table}\" violates foreign key \"{fk}\""
                )));
            }
        }

        let now = timestamp(state.tick());
        record
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        for column in ["created_at", "updated_at"] {
            if table.has_column(column) {
                record.entry(column).or_insert_with(|| now.clone());
            }
        }
        for column in table.columns() {
            record.entry(*column).or_insert(Value::Null);
        }

        state.rows.entry(table).or_default().push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: Table, filter: &Filter, patch: Record) -> PortResult<Record> {
        check_columns(table, &patch)?;
        let mut state = self.state.write().await;

        let mut updated = None;
        for row in state.rows.entry(table).or_default().iter_mut() {
            if filter.matches(row) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                updated.get_or_insert_with(|| row.clone());
            }
        }
        updated.ok_or_else(|| PortError::NotFound(format!("no matching row in {table}")))
    }

    async fn delete(&self, table: Table, filter: &Filter) -> PortResult<()> {
        self.state.write().await.remove(table, filter);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(
        &self,
        email: &str,
        full_name: &str,
        hashed_password: &str,
    ) -> PortResult<Account> {
        let mut state = self.state.write().await;
        if state.accounts.iter().any(|c| c.account.email == email) {
            return Err(PortError::Conflict(format!(
                "An account with email {email} already exists"
            )));
        }

        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            created_at: state.tick(),
        };
        state.accounts.push(AccountCredentials {
            account: account.clone(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(account)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let state = self.state.read().await;
        state
            .accounts
            .iter()
            .find(|c| c.account.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Account {email} not found")))
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let state = self.state.read().await;
        state
            .accounts
            .iter()
            .find(|c| c.account.id == account_id)
            .map(|c| c.account.clone())
            .ok_or_else(|| PortError::NotFound(format!("Account {account_id} not found")))
    }

    async fn update_full_name(&self, account_id: Uuid, full_name: &str) -> PortResult<Account> {
        let mut state = self.state.write().await;
        let credentials = state
            .accounts
            .iter_mut()
            .find(|c| c.account.id == account_id)
            .ok_or_else(|| PortError::NotFound(format!("Account {account_id} not found")))?;
        credentials.account.full_name = full_name.to_string();
        Ok(credentials.account.clone())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut state = self.state.write().await;
        if !state.accounts.iter().any(|c| c.account.id == account_id) {
            return Err(PortError::NotFound(format!("Account {account_id} not found")));
        }
        state.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                account_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Account> {
        let state = self.state.read().await;
        let session = state
            .sessions
            .get(session_id)
            .filter(|s| s.expires_at > Utc::now())
            .ok_or(PortError::Unauthorized)?;
        state
            .accounts
            .iter()
            .find(|c| c.account.id == session.account_id)
            .map(|c| c.account.clone())
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state.write().await.sessions.remove(session_id);
        Ok(())
    }
}
