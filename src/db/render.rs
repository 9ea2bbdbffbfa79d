//! SQL statement rendering.
//!
//! [`SqlRenderer`] assembles INSERT / SELECT / UPDATE / DELETE text from
//! [`QueryParams`]. Identifiers and expressions are emitted verbatim; every
//! value goes through a placeholder and comes back in [`Statement::params`]
//! in the same order.

use crate::db::conditions::{ConditionParser, RenderedCondition};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Fields, Join, QueryParam, QueryParams};

/// Rendered SQL with its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

#[derive(Debug, Clone, Copy)]
pub struct SqlRenderer {
    db_type: DatabaseType,
}

impl SqlRenderer {
    pub fn new(db_type: DatabaseType) -> Self {
        Self { db_type }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// `INSERT INTO t (c1, c2) VALUES (?, ?)`, columns in data order.
    pub fn insert(&self, params: &QueryParams) -> DbResult<Statement> {
        let table = require_table(params)?;
        let data = params
            .data
            .as_ref()
            .ok_or_else(|| DbError::invalid_input("Insert requires 'data'"))?;

        let mut sql = format!("INSERT INTO {}", table);
        if data.is_empty() {
            sql.push_str(match self.db_type {
                DatabaseType::MySQL => " () VALUES ()",
                _ => " DEFAULT VALUES",
            });
        } else {
            let columns: Vec<&str> = data.columns().map(String::as_str).collect();
            let placeholders: Vec<String> = (1..=data.len())
                .map(|i| self.db_type.placeholder(i))
                .collect();
            sql.push_str(&format!(
                " ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ));
        }

        if self.db_type.needs_returning_for_insert_id() {
            if let Some(column) = &params.returning {
                sql.push_str(&format!(" RETURNING {}", column));
            }
        }

        Ok(Statement {
            sql,
            params: data.values().map(QueryParam::from).collect(),
        })
    }

    pub fn select(&self, params: &QueryParams) -> DbResult<Statement> {
        let fields = alias(&params.fields);
        self.select_with(params, &fields, true)
    }

    /// `SELECT COUNT(*) AS count ...` over the same joins and conditions.
    pub fn count(&self, params: &QueryParams) -> DbResult<Statement> {
        self.select_with(params, "COUNT(*) AS count", false)
    }

    fn select_with(&self, params: &QueryParams, fields: &str, paged: bool) -> DbResult<Statement> {
        let table = require_table(params)?;
        let condition = self.conditions(params, 0);

        let mut sql = format!("SELECT {} FROM {}", fields, table);
        for join in &params.joins {
            sql.push(' ');
            sql.push_str(&render_join(join));
        }
        if !condition.is_empty() {
            sql.push_str(&format!(" WHERE {}", condition.sql));
        }
        if !params.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", params.group_by.join(", ")));
        }
        if let Some(having) = params.having.as_deref().filter(|h| !h.trim().is_empty()) {
            sql.push_str(&format!(" HAVING {}", having));
        }
        if paged {
            if !params.order.is_empty() {
                sql.push_str(&format!(" ORDER BY {}", params.order.join(", ")));
            }
            sql.push_str(&self.limit_clause(params.limit, params.offset));
        }

        Ok(Statement {
            sql,
            params: condition.values,
        })
    }

    /// SET values bind first; condition placeholders continue after them.
    pub fn update(&self, params: &QueryParams) -> DbResult<Statement> {
        let table = require_table(params)?;
        let values = params
            .values
            .as_ref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DbError::invalid_input("Update requires non-empty 'values'"))?;
        let condition = self.conditions(params, values.len());
        if condition.is_empty() {
            return Err(DbError::invalid_input("Update requires 'conditions'"));
        }

        let assignments: Vec<String> = values
            .columns()
            .enumerate()
            .map(|(i, column)| format!("{} = {}", column, self.db_type.placeholder(i + 1)))
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignments.join(", "),
            condition.sql
        );
        sql.push_str(&self.write_tail(params));

        let mut bound: Vec<QueryParam> = values.values().map(QueryParam::from).collect();
        bound.extend(condition.values);
        Ok(Statement { sql, params: bound })
    }

    pub fn delete(&self, params: &QueryParams) -> DbResult<Statement> {
        let table = require_table(params)?;
        let condition = self.conditions(params, 0);
        if condition.is_empty() {
            return Err(DbError::invalid_input("Delete requires 'conditions'"));
        }

        let mut sql = format!("DELETE FROM {} WHERE {}", table, condition.sql);
        sql.push_str(&self.write_tail(params));

        Ok(Statement {
            sql,
            params: condition.values,
        })
    }

    fn conditions(&self, params: &QueryParams, offset: usize) -> RenderedCondition {
        params
            .conditions
            .as_ref()
            .map(|c| ConditionParser::with_offset(self.db_type, offset).parse(c))
            .unwrap_or_default()
    }

    /// ORDER BY / LIMIT on UPDATE and DELETE; only MySQL accepts them.
    fn write_tail(&self, params: &QueryParams) -> String {
        if !self.db_type.supports_write_limit() {
            return String::new();
        }
        let mut tail = String::new();
        if !params.order.is_empty() {
            tail.push_str(&format!(" ORDER BY {}", params.order.join(", ")));
        }
        if let Some(limit) = params.limit {
            tail.push_str(&format!(" LIMIT {}", limit));
        }
        tail
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            // an OFFSET needs a LIMIT on MySQL and SQLite
            (None, Some(offset)) => match self.db_type {
                DatabaseType::PostgreSQL => format!(" OFFSET {}", offset),
                DatabaseType::MySQL => format!(" LIMIT 18446744073709551615 OFFSET {}", offset),
                DatabaseType::SQLite => format!(" LIMIT -1 OFFSET {}", offset),
            },
            (None, None) => String::new(),
        }
    }
}

fn require_table(params: &QueryParams) -> DbResult<&str> {
    let table = params.table.trim();
    if table.is_empty() {
        return Err(DbError::invalid_input("Query requires a 'table'"));
    }
    Ok(table)
}

/// Render a projection; aliased fields become `expr AS alias`.
pub fn alias(fields: &Fields) -> String {
    match fields {
        Fields::All => "*".to_string(),
        Fields::List(items) if items.is_empty() => "*".to_string(),
        Fields::List(items) => items.join(", "),
        Fields::Aliased(pairs) => pairs
            .iter()
            .map(|(alias, expr)| format!("{} AS {}", expr, alias))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// `[KIND] JOIN table [ON cond]`; raw joins are emitted verbatim.
pub fn render_join(join: &Join) -> String {
    match join {
        Join::Raw(sql) => sql.clone(),
        Join::Spec { table, kind, on } => {
            let mut out = String::new();
            if let Some(kind) = kind.as_deref().filter(|k| !k.trim().is_empty()) {
                out.push_str(&kind.trim().to_uppercase());
                out.push(' ');
            }
            out.push_str("JOIN ");
            out.push_str(table);
            if let Some(on) = on.as_deref().filter(|o| !o.trim().is_empty()) {
                out.push_str(" ON ");
                out.push_str(on);
            }
            out
        }
    }
}
