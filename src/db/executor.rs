//! Statement execution.
//!
//! Runs rendered statements either on the pool or on the datasource's open
//! transaction, binding [`QueryParam`]s in order and decoding result rows into
//! [`Record`]s.
//!
//! # Architecture
//!
//! Each dialect has its own submodule (`mysql`, `postgres`, `sqlite`) with the
//! same interface. The functions there are generic over the sqlx executor so
//! one implementation serves both `&Pool` and `&mut Connection` (the inside of
//! an open transaction).

use crate::config::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::db::pool::DbPool;
use crate::db::types::RowToRecord;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam, Record};
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    pub async fn begin(pool: &DbPool) -> DbResult<Self> {
        Ok(match pool {
            DbPool::MySql(p) => Self::MySql(p.begin().await?),
            DbPool::Postgres(p) => Self::Postgres(p.begin().await?),
            DbPool::SQLite(p) => Self::SQLite(p.begin().await?),
        })
    }

    pub fn db_type(&self) -> DatabaseType {
        match self {
            Self::MySql(_) => DatabaseType::MySQL,
            Self::Postgres(_) => DatabaseType::PostgreSQL,
            Self::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub async fn commit(self) -> DbResult<()> {
        match self {
            Self::MySql(tx) => tx.commit().await.map_err(DbError::from),
            Self::Postgres(tx) => tx.commit().await.map_err(DbError::from),
            Self::SQLite(tx) => tx.commit().await.map_err(DbError::from),
        }
    }

    pub async fn rollback(self) -> DbResult<()> {
        match self {
            Self::MySql(tx) => tx.rollback().await.map_err(DbError::from),
            Self::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            Self::SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        }
    }
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbTransaction").field(&self.db_type()).finish()
    }
}

/// Result of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rows_affected: u64,
    /// Generated key, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// Executes statements with a per-statement timeout.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a statement that returns rows.
    pub async fn fetch(
        &self,
        pool: &DbPool,
        tx: Option<&mut DbTransaction>,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Record>> {
        let start = Instant::now();
        debug!(sql = %sql, params = params.len(), in_transaction = tx.is_some(), "Fetching rows");

        let future = async {
            match tx {
                Some(DbTransaction::MySql(tx)) => mysql::fetch(&mut **tx, sql, params).await,
                Some(DbTransaction::Postgres(tx)) => postgres::fetch(&mut **tx, sql, params).await,
                Some(DbTransaction::SQLite(tx)) => sqlite::fetch(&mut **tx, sql, params).await,
                None => match pool {
                    DbPool::MySql(p) => mysql::fetch(p, sql, params).await,
                    DbPool::Postgres(p) => postgres::fetch(p, sql, params).await,
                    DbPool::SQLite(p) => sqlite::fetch(p, sql, params).await,
                },
            }
        };

        let records = match timeout(self.timeout, future).await {
            Ok(result) => result?,
            Err(_) => return Err(timeout_error("query execution", self.timeout)),
        };

        debug!(
            rows = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched rows"
        );
        Ok(records)
    }

    /// Run a statement that does not return rows.
    pub async fn execute(
        &self,
        pool: &DbPool,
        tx: Option<&mut DbTransaction>,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<WriteOutcome> {
        let start = Instant::now();
        debug!(sql = %sql, params = params.len(), in_transaction = tx.is_some(), "Executing statement");

        let future = async {
            match tx {
                Some(DbTransaction::MySql(tx)) => mysql::execute(&mut **tx, sql, params).await,
                Some(DbTransaction::Postgres(tx)) => {
                    postgres::execute(&mut **tx, sql, params).await
                }
                Some(DbTransaction::SQLite(tx)) => sqlite::execute(&mut **tx, sql, params).await,
                None => match pool {
                    DbPool::MySql(p) => mysql::execute(p, sql, params).await,
                    DbPool::Postgres(p) => postgres::execute(p, sql, params).await,
                    DbPool::SQLite(p) => sqlite::execute(p, sql, params).await,
                },
            }
        };

        let outcome = match timeout(self.timeout, future).await {
            Ok(result) => result?,
            Err(_) => return Err(timeout_error("write operation", self.timeout)),
        };

        debug!(
            rows_affected = outcome.rows_affected,
            last_insert_id = ?outcome.last_insert_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(outcome)
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs() as u32)
}

// Each module below provides the same interface adapted to its database type.
// Statements without parameters go through the raw text protocol, which also
// accepts SQL that cannot be prepared.

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlArguments;

    pub async fn fetch<'c, E>(executor: E, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Record>>
    where
        E: sqlx::Executor<'c, Database = MySql>,
    {
        let rows = if params.is_empty() {
            executor.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.fetch_all(executor).await?
        };
        Ok(rows.iter().map(RowToRecord::to_record).collect())
    }

    pub async fn execute<'c, E>(executor: E, sql: &str, params: &[QueryParam]) -> DbResult<WriteOutcome>
    where
        E: sqlx::Executor<'c, Database = MySql>,
    {
        let result = if params.is_empty() {
            executor.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.execute(executor).await?
        };
        Ok(WriteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: match result.last_insert_id() {
                0 => None,
                id => i64::try_from(id).ok(),
            },
        })
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, MySql, MySqlArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::PgArguments;

    pub async fn fetch<'c, E>(executor: E, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Record>>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let rows = if params.is_empty() {
            executor.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.fetch_all(executor).await?
        };
        Ok(rows.iter().map(RowToRecord::to_record).collect())
    }

    /// PostgreSQL reports no generated key here; inserts that need one use
    /// `RETURNING` through [`fetch`].
    pub async fn execute<'c, E>(executor: E, sql: &str, params: &[QueryParam]) -> DbResult<WriteOutcome>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let result = if params.is_empty() {
            executor.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.execute(executor).await?
        };
        Ok(WriteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, Postgres, PgArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, Postgres, PgArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::SqliteArguments;

    pub async fn fetch<'c, E>(executor: E, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Record>>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let rows = if params.is_empty() {
            executor.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.fetch_all(executor).await?
        };
        Ok(rows.iter().map(RowToRecord::to_record).collect())
    }

    pub async fn execute<'c, E>(executor: E, sql: &str, params: &[QueryParam]) -> DbResult<WriteOutcome>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let result = if params.is_empty() {
            executor.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.execute(executor).await?
        };
        Ok(WriteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: match result.last_insert_rowid() {
                0 => None,
                id => Some(id),
            },
        })
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            // no native JSON type, stored as text
            QueryParam::Json(v) => query.bind(v.to_string()),
        }
    }
}
