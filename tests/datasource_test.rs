//! Integration tests for the query-building datasource against SQLite.
//!
//! Tests verify that:
//! - CRUD intents render and bind correctly for the dialect
//! - The last statement, affected rows and insert id are tracked
//! - An open transaction captures subsequent statements
//! - The connection manager registers and releases datasources

use modelgate::config::PoolOptions;
use modelgate::db::{ConnectionManager, Datasource, SchemaProvider};
use modelgate::models::{Condition, ConnectionConfig, Fields, Operator, QueryParams, Record};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

/// Open a file-backed SQLite datasource with a `users` table.
async fn setup_db() -> (Arc<Datasource>, ConnectionManager, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let manager = ConnectionManager::new();
    let config = ConnectionConfig::new("test", &url, PoolOptions::default()).unwrap();
    let datasource = manager.connect(config).await.unwrap();

    datasource
        .execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
            &[],
        )
        .await
        .unwrap();

    (datasource, manager, dir)
}

async fn seed(ds: &Datasource) {
    for (name, age) in [("alice", 31), ("bob", 17), ("carol", 45), ("dave", 22)] {
        let params =
            QueryParams::new("users").with_data(Record::new().with("name", name).with("age", age));
        ds.create(&params).await.unwrap();
    }
}

#[tokio::test]
async fn test_create_tracks_insert_id() {
    let (ds, _manager, _dir) = setup_db().await;

    let params = QueryParams::new("users").with_data(Record::new().with("name", "alice").with("age", 31));
    let outcome = ds.create(&params).await.unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.last_insert_id, Some(1));
    assert_eq!(ds.insert_id().await, Some(1));
    assert_eq!(ds.affected_rows().await, 1);
    assert_eq!(
        ds.last_query().await.as_deref(),
        Some("INSERT INTO users (name, age) VALUES (?, ?)")
    );
}

#[tokio::test]
async fn test_read_with_conditions_order_and_limit() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    let params = QueryParams::new("users")
        .with_fields(Fields::list(["name"]))
        .with_conditions(Condition::compare("age", Operator::Gte, 18))
        .with_order("age DESC")
        .with_limit(2);
    let rows = ds.read(&params).await.unwrap();

    let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned().unwrap()).collect();
    assert_eq!(names, vec![json!("carol"), json!("alice")]);
    assert!(!rows[0].contains("age"));
}

#[tokio::test]
async fn test_read_from_json_conditions() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    let conditions = Condition::from_json(&json!({
        "or": {"name": ["alice", "bob"], "age >": 40}
    }))
    .unwrap();
    let params = QueryParams::new("users")
        .with_conditions(conditions)
        .with_order("id");
    let rows = ds.read(&params).await.unwrap();

    let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned().unwrap()).collect();
    assert_eq!(names, vec![json!("alice"), json!("bob"), json!("carol")]);
}

#[tokio::test]
async fn test_offset_without_limit() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    let params = QueryParams::new("users").with_order("id").with_offset(3);
    let rows = ds.read(&params).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("dave")));
}

#[tokio::test]
async fn test_count_ignores_paging() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    let params = QueryParams::new("users")
        .with_conditions(Condition::compare("age", Operator::Lt, 40))
        .with_limit(1);
    assert_eq!(ds.count(&params).await.unwrap(), 3);
}

#[tokio::test]
async fn test_update_and_delete() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    let update = QueryParams::new("users")
        .with_values(Record::new().with("age", 18))
        .with_conditions(Condition::eq("name", "bob"));
    assert_eq!(ds.update(&update).await.unwrap(), 1);

    let bob = ds
        .read(&QueryParams::new("users").with_conditions(Condition::eq("name", "bob")))
        .await
        .unwrap();
    assert_eq!(bob[0].get("age"), Some(&json!(18)));

    let delete = QueryParams::new("users").with_conditions(Condition::compare("age", Operator::Lt, 30));
    assert_eq!(ds.delete(&delete).await.unwrap(), 2);
    assert_eq!(ds.affected_rows().await, 2);
    assert_eq!(ds.count(&QueryParams::new("users")).await.unwrap(), 2);
}

#[tokio::test]
async fn test_update_without_conditions_is_rejected() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    let update = QueryParams::new("users").with_values(Record::new().with("age", 1));
    assert!(ds.update(&update).await.is_err());
    assert!(ds.delete(&QueryParams::new("users")).await.is_err());
    assert_eq!(ds.count(&QueryParams::new("users")).await.unwrap(), 4);
}

#[tokio::test]
async fn test_null_condition_matches_missing_values() {
    let (ds, _manager, _dir) = setup_db().await;
    ds.create(&QueryParams::new("users").with_data(Record::new().with("name", "eve")))
        .await
        .unwrap();
    seed(&ds).await;

    let params = QueryParams::new("users").with_conditions(Condition::from_json(&json!({"age": null})).unwrap());
    let rows = ds.read(&params).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("eve")));
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    ds.begin().await.unwrap();
    assert!(ds.in_transaction().await);
    ds.delete(&QueryParams::new("users").with_conditions(Condition::eq("name", "alice")))
        .await
        .unwrap();
    assert_eq!(ds.count(&QueryParams::new("users")).await.unwrap(), 3);
    ds.rollback().await.unwrap();

    assert!(!ds.in_transaction().await);
    assert_eq!(ds.count(&QueryParams::new("users")).await.unwrap(), 4);
}

#[tokio::test]
async fn test_transaction_commit_keeps_writes() {
    let (ds, _manager, _dir) = setup_db().await;

    ds.begin().await.unwrap();
    assert!(ds.begin().await.is_err());
    ds.create(&QueryParams::new("users").with_data(Record::new().with("name", "zed")))
        .await
        .unwrap();
    ds.commit().await.unwrap();

    assert_eq!(ds.count(&QueryParams::new("users")).await.unwrap(), 1);
    assert!(ds.commit().await.is_err());
}

#[tokio::test]
async fn test_raw_query_binds_placeholders() {
    let (ds, _manager, _dir) = setup_db().await;
    seed(&ds).await;

    let rows = ds
        .query(
            "SELECT name FROM users WHERE age > ? AND name <> ? ORDER BY id",
            &[json!(20).into(), json!("dave").into()],
        )
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned().unwrap()).collect();
    assert_eq!(names, vec![json!("alice"), json!("carol")]);
}

#[tokio::test]
async fn test_schema_introspection() {
    let (ds, _manager, _dir) = setup_db().await;

    let schema = ds.describe_table("users").await.unwrap();
    assert_eq!(schema.primary_key.as_deref(), Some("id"));
    assert_eq!(schema.column_names(), vec!["id", "name", "age"]);
    assert_eq!(ds.list_tables().await.unwrap(), vec!["users".to_string()]);
}

#[tokio::test]
async fn test_connection_manager_lifecycle() {
    let (_ds, manager, dir) = setup_db().await;

    assert_eq!(manager.list().await, vec!["test".to_string()]);
    assert!(manager.get("test").await.is_ok());
    assert!(manager.get("missing").await.is_err());

    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let duplicate = ConnectionConfig::new("test", &url, PoolOptions::default()).unwrap();
    assert!(manager.connect(duplicate).await.is_err());

    manager.disconnect("test").await.unwrap();
    assert!(!manager.exists("test").await);
    assert!(manager.disconnect("test").await.is_err());
    manager.close_all().await;
    assert_eq!(manager.connection_count().await, 0);
}
