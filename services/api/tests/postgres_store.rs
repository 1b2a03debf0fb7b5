//! Runs the PostgreSQL adapter against a live database.
//!
//! Skipped unless `DATABASE_URL` points at Postgres, e.g.
//! `DATABASE_URL=postgres://localhost/chatbot_builder_test cargo test`.

use api_lib::adapters::DbAdapter;
use chatbot_builder_core::ports::{AccountStore, Datastore, Filter, Order, PortError, Record};
use chatbot_builder_core::schema::Table;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn adapter() -> Option<DbAdapter> {
    let url = std::env::var("DATABASE_URL").ok()?;
    if !url.starts_with("postgres") {
        return None;
    }
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
    let adapter = DbAdapter::new(pool);
    adapter.run_migrations().await.unwrap();
    Some(adapter)
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn row_id(row: &Record) -> Uuid {
    row["id"].as_str().unwrap().parse().unwrap()
}

async fn owner(db: &DbAdapter) -> Uuid {
    let email = format!("{}@example.com", Uuid::new_v4());
    db.create_account(&email, "Owner", "hash").await.unwrap().id
}

#[tokio::test]
async fn rows_round_trip_through_json_records() {
    let Some(db) = adapter().await else {
        eprintln!("DATABASE_URL is not a Postgres URL; skipping");
        return;
    };
    let owner = owner(&db).await;

    let bot = db
        .insert(
            Table::Chatbots,
            record(json!({"owner_account_id": owner, "name": "Bot", "temperature": 0.25})),
        )
        .await
        .unwrap();
    assert_eq!(bot["name"], "Bot");
    assert_eq!(bot["temperature"], json!(0.25));
    assert_eq!(bot["is_public"], false);
    assert!(bot["created_at"].is_string());
    let bot_id = row_id(&bot);

    let updated = db
        .update(
            Table::Chatbots,
            &Filter::by_id(bot_id),
            record(json!({"description": "hello", "is_public": true})),
        )
        .await
        .unwrap();
    assert_eq!(updated["description"], "hello");
    assert_eq!(updated["is_public"], true);
    assert_eq!(updated["name"], "Bot");

    let fetched = db.select_one(Table::Chatbots, &Filter::by_id(bot_id)).await.unwrap();
    assert_eq!(fetched["description"], "hello");

    let missing = db.select_one(Table::Chatbots, &Filter::by_id(Uuid::new_v4())).await;
    assert!(matches!(missing, Err(PortError::NotFound(_))));
}

#[tokio::test]
async fn children_are_ordered_and_cascade_with_their_chatbot() {
    let Some(db) = adapter().await else {
        eprintln!("DATABASE_URL is not a Postgres URL; skipping");
        return;
    };
    let owner = owner(&db).await;
    let bot = db
        .insert(Table::Chatbots, record(json!({"owner_account_id": owner, "name": "Bot"})))
        .await
        .unwrap();
    let bot_id = row_id(&bot);

    let conversation = db
        .insert(
            Table::Conversations,
            record(json!({"chatbot_id": bot_id, "metadata": {"source": "test"}})),
        )
        .await
        .unwrap();
    assert_eq!(conversation["title"], "New conversation");
    assert_eq!(conversation["metadata"]["source"], "test");
    let conversation_id = row_id(&conversation);

    for content in ["first", "second", "third"] {
        db.insert(
            Table::Messages,
            record(json!({
                "conversation_id": conversation_id,
                "role": "user",
                "content": content,
            })),
        )
        .await
        .unwrap();
    }
    let messages = db
        .select(
            Table::Messages,
            &Filter::new().eq("conversation_id", conversation_id),
            Some(Order::asc("created_at")),
        )
        .await
        .unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, ["first", "second", "third"]);

    db.delete(Table::Chatbots, &Filter::by_id(bot_id)).await.unwrap();
    let left = db
        .select(Table::Messages, &Filter::new().eq("conversation_id", conversation_id), None)
        .await
        .unwrap();
    assert!(left.is_empty());
}

#[tokio::test]
async fn orphans_and_duplicates_are_rejected() {
    let Some(db) = adapter().await else {
        eprintln!("DATABASE_URL is not a Postgres URL; skipping");
        return;
    };

    let orphan = db
        .insert(
            Table::Sources,
            record(json!({"chatbot_id": Uuid::new_v4(), "name": "Doc", "type": "text"})),
        )
        .await;
    assert!(orphan.is_err());

    let email = format!("{}@example.com", Uuid::new_v4());
    db.create_account(&email, "A", "hash").await.unwrap();
    assert!(matches!(
        db.create_account(&email, "B", "hash").await,
        Err(PortError::Conflict(_))
    ));
}

#[tokio::test]
async fn sessions_resolve_until_they_expire() {
    let Some(db) = adapter().await else {
        eprintln!("DATABASE_URL is not a Postgres URL; skipping");
        return;
    };
    let account = owner(&db).await;
    let live = Uuid::new_v4().to_string();
    let stale = Uuid::new_v4().to_string();

    db.create_auth_session(&live, account, Utc::now() + Duration::days(1))
        .await
        .unwrap();
    db.create_auth_session(&stale, account, Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    assert_eq!(db.validate_auth_session(&live).await.unwrap().id, account);
    assert!(matches!(
        db.validate_auth_session(&stale).await,
        Err(PortError::Unauthorized)
    ));

    db.delete_auth_session(&live).await.unwrap();
    assert!(db.validate_auth_session(&live).await.is_err());
}
