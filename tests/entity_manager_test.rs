//! Integration tests for the entity manager against SQLite.
//!
//! Tests verify that:
//! - save inserts or updates depending on the primary key
//! - Unknown columns are dropped before writing
//! - Model hooks wrap finds, saves, deletes and validation
//! - Rule sets dispatch to model rules, engine rules and regex names

use modelgate::config::PoolOptions;
use modelgate::db::ConnectionManager;
use modelgate::entity::{
    EntityManager, FieldRule, FindType, Model, RuleOn, RuleOutcome, ValidationRules,
};
use modelgate::models::{Condition, ConnectionConfig, QueryParams, Record};
use modelgate::Datasource;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

async fn setup_db() -> (Arc<Datasource>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("entities.db").display());
    let manager = ConnectionManager::new();
    let config = ConnectionConfig::new("entities", &url, PoolOptions::default()).unwrap();
    let datasource = manager.connect(config).await.unwrap();

    datasource
        .execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL, email TEXT, age INTEGER)",
            &[],
        )
        .await
        .unwrap();

    (datasource, dir)
}

struct User;

impl Model for User {
    fn validation_rules(&self) -> ValidationRules {
        ValidationRules::new()
            .field(
                "username",
                FieldRule::new("notEmpty")
                    .required()
                    .last()
                    .with_message("Username is required"),
            )
            .field(
                "username",
                FieldRule::new("alphaNumeric").with_message("Letters and numbers only"),
            )
            .field(
                "username",
                FieldRule::new("between")
                    .with_args(vec![json!(3), json!(10)])
                    .with_message("Between %d and %d characters"),
            )
            .field("username", FieldRule::new("reserved"))
            .field(
                "email",
                FieldRule::new("email")
                    .allow_empty(true)
                    .with_message("Invalid email"),
            )
            .field("age", FieldRule::new("numeric").with_message("Age must be a number"))
            .field("age", FieldRule::new("even").with_message("Age must be even"))
            .field(
                "country",
                FieldRule::new("^[A-Z]{2}$").with_message("Use a two-letter code"),
            )
            .field(
                "nickname",
                FieldRule::new("!blank").with_message("Nickname cannot be blank"),
            )
            .field(
                "id",
                FieldRule::new("numeric")
                    .on(RuleOn::Update)
                    .with_message("Bad id"),
            )
    }

    fn custom_rule(
        &self,
        name: &str,
        _field: &str,
        value: &JsonValue,
        _args: &[JsonValue],
        _data: &Record,
    ) -> Option<RuleOutcome> {
        match name {
            "even" => Some(RuleOutcome::from(value.as_i64().is_some_and(|n| n % 2 == 0))),
            "reserved" if value == "admin" => {
                Some(RuleOutcome::FailWith("admin is reserved".to_string()))
            }
            "reserved" => Some(RuleOutcome::Pass),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Audited {
    events: Mutex<Vec<String>>,
    block_deletes: bool,
}

impl Audited {
    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Model for Audited {
    fn table_name(&self) -> String {
        "users".to_string()
    }

    fn before_find(&self, params: QueryParams) -> Option<QueryParams> {
        self.log("before_find");
        Some(params.with_order("id"))
    }

    fn after_find(&self, rows: Vec<Record>) -> Vec<Record> {
        self.log(format!("after_find:{}", rows.len()));
        rows
    }

    fn before_save(&self, data: &mut Record) -> bool {
        self.log("before_save");
        if let Some(name) = data.get("username").and_then(JsonValue::as_str) {
            let lowered = name.to_lowercase();
            data.insert("username", lowered);
        }
        true
    }

    fn after_save(&self, created: bool) {
        self.log(format!("after_save:{created}"));
    }

    fn before_delete(&self, _id: &JsonValue) -> bool {
        self.log("before_delete");
        !self.block_deletes
    }

    fn after_delete(&self, id: &JsonValue) {
        self.log(format!("after_delete:{id}"));
    }

    fn before_validate(&self, data: &mut Record) -> bool {
        self.log("before_validate");
        data.insert("username", "x");
        true
    }
}

#[tokio::test]
async fn test_table_and_schema_loaded() {
    let (ds, _dir) = setup_db().await;
    let users = EntityManager::new(ds, User).await.unwrap();

    assert_eq!(users.table(), "users");
    assert_eq!(users.primary_key(), "id");
    assert_eq!(
        users.schema().column_names(),
        vec!["id", "username", "email", "age"]
    );
}

#[tokio::test]
async fn test_save_inserts_then_updates() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let data = Record::new()
        .with("username", "alice")
        .with("email", "alice@example.com")
        .with("age", 30)
        .with("not_a_column", "dropped");
    assert!(users.save(data).await.unwrap());
    assert_eq!(users.last_id(), Some(1));
    assert_eq!(users.affected_rows(), 1);

    let id = users.last_id().unwrap();
    let saved = users
        .first(QueryParams::default().with_conditions(Condition::eq("id", id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.get("username"), Some(&json!("alice")));
    assert_eq!(saved.get("age"), Some(&json!(30)));
    assert!(!saved.contains("not_a_column"));

    let update = Record::new().with("id", 1).with("age", 31);
    assert!(users.save(update).await.unwrap());
    assert_eq!(users.count(QueryParams::default()).await.unwrap(), 1);

    let saved = users
        .first(QueryParams::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.get("age"), Some(&json!(31)));
    assert_eq!(saved.get("username"), Some(&json!("alice")));
}

#[tokio::test]
async fn test_null_primary_key_inserts() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let data = Record::new().with("id", JsonValue::Null).with("username", "bob");
    assert!(users.save(data).await.unwrap());
    assert_eq!(users.last_id(), Some(1));
}

#[tokio::test]
async fn test_update_of_missing_row_reports_false() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let data = Record::new().with("id", 42).with("username", "ghost");
    assert!(!users.save(data).await.unwrap());
    assert_eq!(users.affected_rows(), 0);
}

#[tokio::test]
async fn test_find_first_and_all() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();
    for name in ["ann", "ben", "cat"] {
        users.save(Record::new().with("username", name)).await.unwrap();
    }

    let all = users
        .find(QueryParams::default().with_order("username DESC"), FindType::All)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].get("username"), Some(&json!("cat")));

    let first = users
        .find(QueryParams::default().with_order("username"), FindType::First)
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].get("username"), Some(&json!("ann")));

    let none = users
        .first(QueryParams::default().with_conditions(Condition::eq("username", "zed")))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_delete_by_id() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();
    users.save(Record::new().with("username", "ann")).await.unwrap();

    assert!(users.delete(1).await.unwrap());
    assert!(!users.delete(1).await.unwrap());
    assert_eq!(users.count(QueryParams::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_hooks_wrap_operations() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, Audited::default()).await.unwrap();

    assert!(users.save(Record::new().with("username", "ANN")).await.unwrap());
    let rows = users.all(QueryParams::default()).await.unwrap();
    assert_eq!(rows[0].get("username"), Some(&json!("ann")));
    assert!(users.delete(1).await.unwrap());

    assert_eq!(
        users.model().events(),
        vec![
            "before_save",
            "after_save:true",
            "before_find",
            "after_find:1",
            "before_delete",
            "after_delete:1",
        ]
    );
}

#[tokio::test]
async fn test_before_delete_can_halt() {
    let (ds, _dir) = setup_db().await;
    let model = Audited {
        block_deletes: true,
        ..Audited::default()
    };
    let mut users = EntityManager::new(ds, model).await.unwrap();
    users.save(Record::new().with("username", "ann")).await.unwrap();

    assert!(!users.delete(1).await.unwrap());
    assert_eq!(users.count(QueryParams::default()).await.unwrap(), 1);
    assert!(!users.model().events().iter().any(|e| e.starts_with("after_delete")));
}

#[tokio::test]
async fn test_before_validate_rewrites_data() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, Audited::default()).await.unwrap();

    let errors = users.validate(&Record::new());
    assert!(errors.is_empty());
    assert_eq!(users.model().events(), vec!["before_validate"]);
}

#[tokio::test]
async fn test_validate_valid_record() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let data = Record::new()
        .with("username", "alice99")
        .with("email", "")
        .with("age", 30)
        .with("country", "NZ")
        .with("nickname", "al");
    let errors = users.validate(&data);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[tokio::test]
async fn test_validate_reports_failures() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let data = Record::new()
        .with("username", "a!")
        .with("email", "not-an-email")
        .with("age", 31)
        .with("country", "nz")
        .with("nickname", "   ");
    let errors = users.validate(&data).clone();

    // between fails after alphaNumeric, the last failure wins
    assert_eq!(errors.get("username"), Some("Between 3 and 10 characters"));
    assert_eq!(errors.get("email"), Some("Invalid email"));
    assert_eq!(errors.get("age"), Some("Age must be even"));
    assert_eq!(errors.get("country"), Some("Use a two-letter code"));
    assert_eq!(errors.get("nickname"), Some("Nickname cannot be blank"));
    assert_eq!(errors.len(), 5);

    assert_eq!(users.validate(&data), &errors);
    assert_eq!(users.validation_errors(), &errors);
}

#[tokio::test]
async fn test_required_and_last() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let errors = users.validate(&Record::new().with("age", 2));
    assert_eq!(errors.get("username"), Some("Username is required"));
    assert_eq!(errors.len(), 1);

    // empty value fails notEmpty, last stops the between rule
    let errors = users.validate(&Record::new().with("username", ""));
    assert_eq!(errors.get("username"), Some("Username is required"));
}

#[tokio::test]
async fn test_custom_rule_message() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let errors = users.validate(&Record::new().with("username", "admin"));
    assert_eq!(errors.get("username"), Some("admin is reserved"));
}

#[tokio::test]
async fn test_on_update_rules_skip_creates() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    let errors = users.validate(&Record::new().with("username", "alice"));
    assert!(errors.is_empty());

    let errors = users.validate(&Record::new().with("id", "abc").with("username", "alice"));
    assert_eq!(errors.get("id"), Some("Bad id"));
}

#[tokio::test]
async fn test_invalidate_overwrites() {
    let (ds, _dir) = setup_db().await;
    let mut users = EntityManager::new(ds, User).await.unwrap();

    users.invalidate("username", "taken");
    users.invalidate("username", "still taken");
    assert_eq!(users.validation_errors().get("username"), Some("still taken"));

    users.validate(&Record::new().with("username", "alice"));
    assert!(users.validation_errors().is_empty());
}
