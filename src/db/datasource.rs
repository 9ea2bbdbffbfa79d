//! The query-building datasource.
//!
//! A [`Datasource`] owns one pool and renders every CRUD intent into a
//! parameterized statement for its dialect. It remembers the last statement,
//! the affected row count and the last generated key, and can hold one open
//! transaction that subsequent statements run inside.

use crate::db::executor::{DbTransaction, QueryExecutor, WriteOutcome};
use crate::db::pool::DbPool;
use crate::db::render::{SqlRenderer, Statement};
use crate::db::schema::{SchemaInspector, SchemaProvider};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType, QueryParam, QueryParams, Record, TableSchema};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct DatasourceState {
    last_query: Option<String>,
    affected_rows: u64,
    last_insert_id: Option<i64>,
    transaction: Option<DbTransaction>,
}

pub struct Datasource {
    id: String,
    pool: DbPool,
    renderer: SqlRenderer,
    executor: QueryExecutor,
    state: Mutex<DatasourceState>,
}

impl std::fmt::Debug for Datasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datasource")
            .field("id", &self.id)
            .field("db_type", &self.db_type())
            .finish_non_exhaustive()
    }
}

impl Datasource {
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let pool = DbPool::connect(config).await?;
        Ok(Self::from_pool(config.id.clone(), pool))
    }

    pub fn from_pool(id: impl Into<String>, pool: DbPool) -> Self {
        let renderer = SqlRenderer::new(pool.db_type());
        Self {
            id: id.into(),
            pool,
            renderer,
            executor: QueryExecutor::new(),
            state: Mutex::new(DatasourceState::default()),
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.executor = QueryExecutor::with_timeout(timeout);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn renderer(&self) -> SqlRenderer {
        self.renderer
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(tx) = state.transaction.take() {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(connection_id = %self.id, error = %e, "Rollback on close failed");
            }
        }
        self.pool.close().await;
    }

    /// INSERT `params.data` into `params.table`.
    pub async fn create(&self, params: &QueryParams) -> DbResult<WriteOutcome> {
        let statement = self.renderer.insert(params)?;
        let returns_key = params.returning.is_some() && self.db_type().needs_returning_for_insert_id();
        if !returns_key {
            return self.run_write(&statement).await;
        }

        let column = params.returning.as_deref().unwrap_or_default();
        let rows = self.run_fetch(&statement).await?;
        let outcome = WriteOutcome {
            rows_affected: rows.len() as u64,
            last_insert_id: rows
                .first()
                .and_then(|row| row.get(column))
                .and_then(json_to_id),
        };
        let mut state = self.state.lock().await;
        state.affected_rows = outcome.rows_affected;
        state.last_insert_id = outcome.last_insert_id;
        Ok(outcome)
    }

    /// SELECT rows matching `params`.
    pub async fn read(&self, params: &QueryParams) -> DbResult<Vec<Record>> {
        let statement = self.renderer.select(params)?;
        self.run_fetch(&statement).await
    }

    /// Row count of the rows `read` would return, ignoring paging.
    pub async fn count(&self, params: &QueryParams) -> DbResult<u64> {
        let statement = self.renderer.count(params)?;
        let rows = self.run_fetch(&statement).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0))
    }

    /// UPDATE rows matching `params.conditions` with `params.values`.
    /// Returns the affected row count.
    pub async fn update(&self, params: &QueryParams) -> DbResult<u64> {
        let statement = self.renderer.update(params)?;
        Ok(self.run_write(&statement).await?.rows_affected)
    }

    /// DELETE rows matching `params.conditions`. Returns the affected row count.
    pub async fn delete(&self, params: &QueryParams) -> DbResult<u64> {
        let statement = self.renderer.delete(params)?;
        Ok(self.run_write(&statement).await?.rows_affected)
    }

    /// Run raw SQL that returns rows. Placeholders follow the dialect.
    pub async fn query(&self, sql: &str, values: &[QueryParam]) -> DbResult<Vec<Record>> {
        self.run_fetch(&Statement {
            sql: sql.to_string(),
            params: values.to_vec(),
        })
        .await
    }

    /// Run raw SQL that does not return rows.
    pub async fn execute(&self, sql: &str, values: &[QueryParam]) -> DbResult<WriteOutcome> {
        self.run_write(&Statement {
            sql: sql.to_string(),
            params: values.to_vec(),
        })
        .await
    }

    pub async fn begin(&self) -> DbResult<()> {
        let mut state = self.state.lock().await;
        if state.transaction.is_some() {
            return Err(DbError::transaction(format!(
                "A transaction is already open on '{}'",
                self.id
            )));
        }
        state.transaction = Some(DbTransaction::begin(&self.pool).await?);
        info!(connection_id = %self.id, "Transaction started");
        Ok(())
    }

    pub async fn commit(&self) -> DbResult<()> {
        let tx = self.take_transaction("commit").await?;
        tx.commit().await?;
        info!(connection_id = %self.id, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(&self) -> DbResult<()> {
        let tx = self.take_transaction("rollback").await?;
        tx.rollback().await?;
        info!(connection_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    pub async fn in_transaction(&self) -> bool {
        self.state.lock().await.transaction.is_some()
    }

    /// Key generated by the last INSERT, if any.
    pub async fn insert_id(&self) -> Option<i64> {
        self.state.lock().await.last_insert_id
    }

    pub async fn affected_rows(&self) -> u64 {
        self.state.lock().await.affected_rows
    }

    pub async fn last_query(&self) -> Option<String> {
        self.state.lock().await.last_query.clone()
    }

    /// Render a value as a SQL literal. For logs and debugging only; statements
    /// always bind values.
    pub fn escape(&self, value: &JsonValue) -> String {
        escape_literal(self.db_type(), value)
    }

    async fn take_transaction(&self, operation: &str) -> DbResult<DbTransaction> {
        let mut state = self.state.lock().await;
        state.transaction.take().ok_or_else(|| {
            DbError::transaction(format!(
                "Cannot {}: no open transaction on '{}'",
                operation, self.id
            ))
        })
    }

    async fn run_fetch(&self, statement: &Statement) -> DbResult<Vec<Record>> {
        let mut state = self.state.lock().await;
        state.last_query = Some(statement.sql.clone());
        debug!(connection_id = %self.id, sql = %statement.sql, params = statement.params.len(), "Read");

        let DatasourceState { transaction, .. } = &mut *state;
        let rows = self
            .executor
            .fetch(&self.pool, transaction.as_mut(), &statement.sql, &statement.params)
            .await?;
        state.affected_rows = rows.len() as u64;
        Ok(rows)
    }

    async fn run_write(&self, statement: &Statement) -> DbResult<WriteOutcome> {
        let mut state = self.state.lock().await;
        state.last_query = Some(statement.sql.clone());
        debug!(connection_id = %self.id, sql = %statement.sql, params = statement.params.len(), "Write");

        let DatasourceState { transaction, .. } = &mut *state;
        let outcome = self
            .executor
            .execute(&self.pool, transaction.as_mut(), &statement.sql, &statement.params)
            .await?;
        state.affected_rows = outcome.rows_affected;
        if outcome.last_insert_id.is_some() {
            state.last_insert_id = outcome.last_insert_id;
        }
        Ok(outcome)
    }
}

impl SchemaProvider for Datasource {
    async fn describe_table(&self, table: &str) -> DbResult<TableSchema> {
        SchemaInspector::describe_table(&self.pool, table).await
    }

    async fn list_tables(&self) -> DbResult<Vec<String>> {
        SchemaInspector::list_tables(&self.pool).await
    }
}

fn json_to_id(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn escape_literal(db_type: DatabaseType, value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => match (db_type, b) {
            (DatabaseType::PostgreSQL, true) => "TRUE".to_string(),
            (DatabaseType::PostgreSQL, false) => "FALSE".to_string(),
            (_, true) => "1".to_string(),
            (_, false) => "0".to_string(),
        },
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => quote(db_type, s),
        other => quote(db_type, &other.to_string()),
    }
}

fn quote(db_type: DatabaseType, s: &str) -> String {
    let mut escaped = s.replace('\'', "''");
    if db_type == DatabaseType::MySQL {
        escaped = escaped.replace('\\', "\\\\");
    }
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(DatabaseType::SQLite, &json!(null)), "NULL");
        assert_eq!(escape_literal(DatabaseType::SQLite, &json!("O'Brien")), "'O''Brien'");
        assert_eq!(escape_literal(DatabaseType::MySQL, &json!("a\\b")), "'a\\\\b'");
        assert_eq!(escape_literal(DatabaseType::PostgreSQL, &json!(true)), "TRUE");
        assert_eq!(escape_literal(DatabaseType::MySQL, &json!(false)), "0");
        assert_eq!(escape_literal(DatabaseType::SQLite, &json!(2.5)), "2.5");
    }

    #[test]
    fn test_json_to_id() {
        assert_eq!(json_to_id(&json!(42)), Some(42));
        assert_eq!(json_to_id(&json!("17")), Some(17));
        assert_eq!(json_to_id(&json!(null)), None);
    }
}
