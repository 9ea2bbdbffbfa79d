//! Schema introspection.
//!
//! Column metadata comes from `PRAGMA table_info` on SQLite and from
//! `information_schema` on MySQL and PostgreSQL. Each dialect has its own
//! submodule with the same interface; the catalog queries live in `queries`.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, TableSchema};
use std::future::Future;
use tracing::debug;

/// Source of table metadata.
pub trait SchemaProvider {
    /// Load the columns and primary key of `table`.
    fn describe_table(&self, table: &str) -> impl Future<Output = DbResult<TableSchema>> + Send;

    /// Names of the user tables, sorted.
    fn list_tables(&self) -> impl Future<Output = DbResult<Vec<String>>> + Send;
}

/// Catalog queries against a pool.
pub struct SchemaInspector;

impl SchemaInspector {
    pub async fn describe_table(pool: &DbPool, table: &str) -> DbResult<TableSchema> {
        let columns = match pool {
            DbPool::Postgres(p) => postgres::fetch_columns(p, table).await?,
            DbPool::MySql(p) => mysql::fetch_columns(p, table).await?,
            DbPool::SQLite(p) => sqlite::fetch_columns(p, table).await?,
        };
        if columns.is_empty() {
            return Err(DbError::schema(
                format!("Table '{}' not found", table),
                table.to_string(),
            ));
        }

        let schema = TableSchema::new(table, columns);
        debug!(
            table = %table,
            columns = schema.columns.len(),
            primary_key = ?schema.primary_key,
            "Described table"
        );
        Ok(schema)
    }

    pub async fn list_tables(pool: &DbPool) -> DbResult<Vec<String>> {
        let tables = match pool {
            DbPool::Postgres(p) => sqlx::query_scalar::<_, String>(queries::postgres::LIST_TABLES)
                .fetch_all(p)
                .await?,
            DbPool::MySql(p) => sqlx::query_scalar::<_, String>(queries::mysql::LIST_TABLES)
                .fetch_all(p)
                .await?,
            DbPool::SQLite(p) => sqlx::query_scalar::<_, String>(queries::sqlite::LIST_TABLES)
                .fetch_all(p)
                .await?,
        };
        debug!(count = tables.len(), "Listed tables");
        Ok(tables)
    }
}

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_name::text FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            c.data_type::text AS column_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            EXISTS (
                SELECT 1
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                WHERE tc.table_name = c.table_name
                AND tc.table_schema = c.table_schema
                AND tc.constraint_type = 'PRIMARY KEY'
                AND kcu.column_name = c.column_name
            ) AS is_primary_key
        FROM information_schema.columns c
        WHERE c.table_name = $1 AND c.table_schema = current_schema()
        ORDER BY c.ordinal_position
        "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(COLUMN_TYPE USING utf8) AS COLUMN_TYPE,
            CONVERT(IS_NULLABLE USING utf8) AS IS_NULLABLE,
            CONVERT(COLUMN_DEFAULT USING utf8) AS COLUMN_DEFAULT,
            CONVERT(COLUMN_KEY USING utf8) AS COLUMN_KEY
        FROM information_schema.columns
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = DATABASE()
        ORDER BY ORDINAL_POSITION
        "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn fetch_columns(pool: &PgPool, table: &str) -> DbResult<Vec<ColumnDefinition>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|row| -> DbResult<ColumnDefinition> {
                let name: String = row.try_get("column_name")?;
                let column_type: String = row.try_get("column_type")?;
                let nullable: String = row.try_get("is_nullable")?;
                let default_value: Option<String> = row.try_get("column_default")?;
                let is_pk: bool = row.try_get("is_primary_key")?;

                let mut col = ColumnDefinition::new(name, column_type, nullable == "YES")
                    .with_primary_key(is_pk);
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                Ok(col)
            })
            .collect()
    }
}

mod mysql {
    use super::*;
    use sqlx::{MySqlPool, Row};

    pub async fn fetch_columns(pool: &MySqlPool, table: &str) -> DbResult<Vec<ColumnDefinition>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|row| -> DbResult<ColumnDefinition> {
                let name: String = row.try_get("COLUMN_NAME")?;
                let column_type: String = row.try_get("COLUMN_TYPE")?;
                let nullable: String = row.try_get("IS_NULLABLE")?;
                let default_value: Option<String> = row.try_get("COLUMN_DEFAULT")?;
                let column_key: Option<String> = row.try_get("COLUMN_KEY")?;

                let mut col = ColumnDefinition::new(name, column_type, nullable == "YES")
                    .with_primary_key(column_key.as_deref() == Some("PRI"));
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                Ok(col)
            })
            .collect()
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn fetch_columns(pool: &SqlitePool, table: &str) -> DbResult<Vec<ColumnDefinition>> {
        // PRAGMA takes no bind parameters
        let pragma = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));
        let rows = sqlx::query(&pragma).fetch_all(pool).await?;

        rows.iter()
            .map(|row| -> DbResult<ColumnDefinition> {
                let name: String = row.try_get("name")?;
                let data_type: String = row.try_get("type")?;
                let notnull: i64 = row.try_get("notnull")?;
                let default_value: Option<String> = row.try_get("dflt_value")?;
                let pk: i64 = row.try_get("pk")?;

                let mut col =
                    ColumnDefinition::new(name, data_type, notnull == 0).with_primary_key(pk > 0);
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                Ok(col)
            })
            .collect()
    }
}
