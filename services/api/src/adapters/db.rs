//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `Datastore` and `AccountStore` ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.
//!
//! Resource rows cross the port as JSON records: reads return `to_jsonb(t)` and
//! writes go through `jsonb_populate_record`, so Postgres performs the column
//! type conversions. Identifiers in generated SQL come only from the static
//! table schema, never from request data; all values are bound parameters.

use async_trait::async_trait;
use chatbot_builder_core::domain::{Account, AccountCredentials};
use chatbot_builder_core::ports::{
    AccountStore, Datastore, Filter, FilterValue, Order, PortError, PortResult, Record,
};
use chatbot_builder_core::schema::Table;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::error;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `Datastore` and `AccountStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn port_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("no matching row".to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        other => {
            error!(error = %other, "database query failed");
            PortError::Unexpected(other.to_string())
        }
    }
}

//=========================================================================================
// SQL Construction
//=========================================================================================

fn quoted(column: &str) -> String {
    format!("\"{column}\"")
}

fn known_column(table: Table, column: &str) -> PortResult<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(PortError::Unexpected(format!("{table} has no column {column}")))
    }
}

fn push_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    table: Table,
    filter: &Filter,
) -> PortResult<()> {
    for (i, (column, value)) in filter.conditions().iter().enumerate() {
        known_column(table, column)?;
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(format!("t.{} = ", quoted(column)));
        match value {
            FilterValue::Uuid(id) => qb.push_bind(*id),
            FilterValue::Text(text) => qb.push_bind(text.clone()),
            FilterValue::Bool(flag) => qb.push_bind(*flag),
        };
    }
    Ok(())
}

/// Column list of a write, in a stable order.
fn written_columns(table: Table, record: &Record) -> PortResult<Vec<String>> {
    let mut columns = Vec::with_capacity(record.len());
    for key in record.keys() {
        known_column(table, key)?;
        columns.push(quoted(key));
    }
    Ok(columns)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    email: String,
    full_name: String,
    created_at: DateTime<Utc>,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    full_name: String,
    created_at: DateTime<Utc>,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> AccountCredentials {
        AccountCredentials {
            account: Account {
                id: self.id,
                email: self.email,
                full_name: self.full_name,
                created_at: self.created_at,
            },
            hashed_password: self.hashed_password,
        }
    }
}

fn into_record(value: Value) -> PortResult<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PortError::Unexpected(format!("expected a row object, got {other}"))),
    }
}

//=========================================================================================
// `Datastore` Trait Implementation
//=========================================================================================

#[async_trait]
impl Datastore for DbAdapter {
    async fn select(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<Order>,
    ) -> PortResult<Vec<Record>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT to_jsonb(t) FROM {table} AS t"));
        push_filter(&mut qb, table, filter)?;
        if let Some(order) = order {
            known_column(table, order.column)?;
            qb.push(format!(
                " ORDER BY t.{} {}",
                quoted(order.column),
                if order.ascending { "ASC" } else { "DESC" }
            ));
        }

        let rows: Vec<Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;
        rows.into_iter().map(into_record).collect()
    }

    async fn select_one(&self, table: Table, filter: &Filter) -> PortResult<Record> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT to_jsonb(t) FROM {table} AS t"));
        push_filter(&mut qb, table, filter)?;
        qb.push(" LIMIT 1");

        let row: Option<Value> = qb
            .build_query_scalar()
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?;
        row.map(into_record)
            .unwrap_or_else(|| Err(PortError::NotFound(format!("no matching row in {table}"))))
    }

    async fn insert(&self, table: Table, record: Record) -> PortResult<Record> {
        let columns = written_columns(table, &record)?.join(", ");
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {table} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{table}, "
        ));
        qb.push_bind(Value::Object(record));
        qb.push(") RETURNING to_jsonb(t)");

        let row: Value = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(port_error)?;
        into_record(row)
    }

    async fn update(&self, table: Table, filter: &Filter, patch: Record) -> PortResult<Record> {
        let assignments = written_columns(table, &patch)?
            .iter()
            .map(|column| format!("{column} = r.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        if assignments.is_empty() {
            return self.select_one(table, filter).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, "
        ));
        qb.push_bind(Value::Object(patch));
        qb.push(") AS r");
        push_filter(&mut qb, table, filter)?;
        qb.push(" RETURNING to_jsonb(t)");

        let rows: Vec<Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;
        rows.into_iter()
            .next()
            .map(into_record)
            .unwrap_or_else(|| Err(PortError::NotFound(format!("no matching row in {table}"))))
    }

    async fn delete(&self, table: Table, filter: &Filter) -> PortResult<()> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {table} AS t"));
        push_filter(&mut qb, table, filter)?;
        qb.build().execute(&self.pool).await.map_err(port_error)?;
        Ok(())
    }
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for DbAdapter {
    async fn create_account(
        &self,
        email: &str,
        full_name: &str,
        hashed_password: &str,
    ) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "INSERT INTO accounts (email, full_name, hashed_password) VALUES ($1, $2, $3) \
             RETURNING id, email, full_name, created_at",
        )
        .bind(email)
        .bind(full_name)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, full_name, created_at, hashed_password \
             FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Account {} not found", email)),
            other => port_error(other),
        })?;
        Ok(record.to_domain())
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, email, full_name, created_at FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Account {} not found", account_id))
            }
            other => port_error(other),
        })?;
        Ok(record.to_domain())
    }

    async fn update_full_name(&self, account_id: Uuid, full_name: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "UPDATE accounts SET full_name = $1 WHERE id = $2 \
             RETURNING id, email, full_name, created_at",
        )
        .bind(full_name)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Account {} not found", account_id))
            }
            other => port_error(other),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, account_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(account_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT a.id, a.email, a.full_name, a.created_at \
             FROM auth_sessions s JOIN accounts a ON a.id = s.account_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?;
        record.map(AccountRecord::to_domain).ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_become_bound_equalities() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT to_jsonb(t) FROM sources AS t");
        let filter = Filter::new().eq("chatbot_id", Uuid::nil()).eq("status", "pending");
        push_filter(&mut qb, Table::Sources, &filter).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT to_jsonb(t) FROM sources AS t WHERE t.\"chatbot_id\" = $1 AND t.\"status\" = $2"
        );
    }

    #[test]
    fn unknown_columns_never_reach_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM chatbots AS t");
        let filter = Filter::new().eq("owner; DROP TABLE chatbots", true);
        assert!(push_filter(&mut qb, Table::Chatbots, &filter).is_err());

        let mut record = Record::new();
        record.insert("secret".into(), Value::Bool(true));
        assert!(written_columns(Table::Messages, &record).is_err());
    }
}
