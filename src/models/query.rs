//! Query-related data models.
//!
//! [`QueryParams`] is the declarative description of one database operation:
//! target table, projected fields, joins, conditions, grouping, ordering and
//! paging, plus the column data for writes. It is built per call and handed to
//! the datasource by shared reference.

use crate::error::{DbError, DbResult};
use crate::models::{Condition, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A parameter value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arrays and objects, bound as JSON
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

impl From<&JsonValue> for QueryParam {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Self::String(s.clone()),
            other => Self::Json(other.clone()),
        }
    }
}

impl From<JsonValue> for QueryParam {
    fn from(value: JsonValue) -> Self {
        Self::from(&value)
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QueryParam {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for QueryParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for QueryParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Projection of a SELECT.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Fields {
    /// `*`
    #[default]
    All,
    /// Plain expressions, emitted verbatim.
    List(Vec<String>),
    /// `(alias, expression)` pairs, emitted as `expression AS alias`.
    Aliased(Vec<(String, String)>),
}

impl Fields {
    pub fn list<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(fields.into_iter().map(Into::into).collect())
    }

    /// Build from the JSON form: a string, an array of strings, or an
    /// object mapping alias to expression.
    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Null => Ok(Self::All),
            JsonValue::String(s) if s.trim() == "*" => Ok(Self::All),
            JsonValue::String(s) => Ok(Self::List(vec![s.clone()])),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(String::from).ok_or_else(|| {
                        DbError::invalid_input("'fields' entries must be strings")
                    })
                })
                .collect::<DbResult<Vec<_>>>()
                .map(Self::List),
            JsonValue::Object(map) => map
                .iter()
                .map(|(alias, expr)| {
                    expr.as_str()
                        .map(|e| (alias.clone(), e.to_string()))
                        .ok_or_else(|| {
                            DbError::invalid_input(format!(
                                "Field alias '{}' must map to a string expression",
                                alias
                            ))
                        })
                })
                .collect::<DbResult<Vec<_>>>()
                .map(Self::Aliased),
            _ => Err(DbError::invalid_input(
                "'fields' must be a string, an array or an object",
            )),
        }
    }
}

/// One JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Join {
    /// Emitted verbatim.
    Raw(String),
    Spec {
        table: String,
        /// `LEFT`, `INNER`, ... (uppercased when rendered)
        kind: Option<String>,
        on: Option<String>,
    },
}

impl Join {
    pub fn new(table: impl Into<String>) -> Self {
        Self::Spec {
            table: table.into(),
            kind: None,
            on: None,
        }
    }

    pub fn left(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::Spec {
            table: table.into(),
            kind: Some("left".to_string()),
            on: Some(on.into()),
        }
    }

    pub fn inner(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::Spec {
            table: table.into(),
            kind: Some("inner".to_string()),
            on: Some(on.into()),
        }
    }

    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::String(s) => Ok(Self::Raw(s.clone())),
            JsonValue::Object(map) => {
                let table = map
                    .get("table")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| DbError::invalid_input("Join requires a 'table' string"))?;
                let text = |key: &str| map.get(key).and_then(JsonValue::as_str).map(String::from);
                Ok(Self::Spec {
                    table: table.to_string(),
                    kind: text("type"),
                    on: text("on"),
                })
            }
            _ => Err(DbError::invalid_input(
                "Join must be a string or an object with 'table'/'type'/'on'",
            )),
        }
    }
}

/// Declarative description of a single database operation.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub table: String,
    pub fields: Fields,
    pub joins: Vec<Join>,
    pub conditions: Option<Condition>,
    pub group_by: Vec<String>,
    pub having: Option<String>,
    pub order: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// Column data for INSERT.
    pub data: Option<Record>,
    /// Column data for UPDATE.
    pub values: Option<Record>,
    /// Column to return from INSERT (PostgreSQL generated keys).
    pub returning: Option<String>,
}

impl QueryParams {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_conditions(mut self, conditions: Condition) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn with_having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order.push(order.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_data(mut self, data: Record) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_values(mut self, values: Record) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_returning(mut self, column: impl Into<String>) -> Self {
        self.returning = Some(column.into());
        self
    }

    /// Fill in the table only when the caller did not name one.
    pub fn or_table(mut self, table: &str) -> Self {
        if self.table.is_empty() {
            self.table = table.to_string();
        }
        self
    }

    /// Fill in the limit only when the caller did not set one.
    pub fn or_limit(mut self, limit: u64) -> Self {
        if self.limit.is_none() {
            self.limit = Some(limit);
        }
        self
    }

    /// Build from the keyed JSON form (`table`, `fields`, `joins`, `conditions`,
    /// `groupBy`, `having`, `order`, `offset`, `limit`, `data`, `values`).
    /// Unrecognized keys are ignored.
    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| DbError::invalid_input("Query parameters must be a JSON object"))?;

        let mut params = Self::new(
            map.get("table")
                .and_then(JsonValue::as_str)
                .unwrap_or_default(),
        );

        if let Some(fields) = map.get("fields") {
            params.fields = Fields::from_json(fields)?;
        }
        if let Some(joins) = map.get("joins") {
            params.joins = match joins {
                JsonValue::Array(items) => {
                    items.iter().map(Join::from_json).collect::<DbResult<_>>()?
                }
                single => vec![Join::from_json(single)?],
            };
        }
        if let Some(conditions) = map.get("conditions") {
            params.conditions = Some(Condition::from_json(conditions)?);
        }
        params.group_by = string_list(map.get("groupBy"), "groupBy")?;
        params.having = map
            .get("having")
            .and_then(JsonValue::as_str)
            .map(String::from);
        params.order = string_list(map.get("order"), "order")?;
        params.offset = unsigned(map.get("offset"), "offset")?;
        params.limit = unsigned(map.get("limit"), "limit")?;
        if let Some(data) = map.get("data") {
            params.data = Some(Record::from_json(data)?);
        }
        if let Some(values) = map.get("values") {
            params.values = Some(Record::from_json(values)?);
        }
        Ok(params)
    }
}

fn string_list(value: Option<&JsonValue>, key: &str) -> DbResult<Vec<String>> {
    match value {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::String(s)) => Ok(vec![s.clone()]),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(String::from)
                    .ok_or_else(|| DbError::invalid_input(format!("'{}' entries must be strings", key)))
            })
            .collect(),
        Some(_) => Err(DbError::invalid_input(format!(
            "'{}' must be a string or an array of strings",
            key
        ))),
    }
}

fn unsigned(value: Option<&JsonValue>, key: &str) -> DbResult<Option<u64>> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| DbError::invalid_input(format!("'{}' must be a non-negative integer", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_from_json() {
        assert_eq!(QueryParam::from(&json!(null)), QueryParam::Null);
        assert_eq!(QueryParam::from(&json!(7)), QueryParam::Int(7));
        assert_eq!(QueryParam::from(&json!(1.5)), QueryParam::Float(1.5));
        assert_eq!(QueryParam::from(&json!("x")), QueryParam::String("x".into()));
        assert_eq!(QueryParam::Int(1).type_name(), "int");
        assert!(matches!(QueryParam::from(&json!([1, 2])), QueryParam::Json(_)));
    }

    #[test]
    fn test_fields_from_json() {
        assert_eq!(Fields::from_json(&json!("*")).unwrap(), Fields::All);
        assert_eq!(
            Fields::from_json(&json!(["id", "name"])).unwrap(),
            Fields::list(["id", "name"])
        );
        assert_eq!(
            Fields::from_json(&json!({"total": "COUNT(*)"})).unwrap(),
            Fields::Aliased(vec![("total".into(), "COUNT(*)".into())])
        );
        assert!(Fields::from_json(&json!(5)).is_err());
    }

    #[test]
    fn test_query_params_from_json() {
        let params = QueryParams::from_json(&json!({
            "table": "users",
            "fields": ["id"],
            "joins": [{"table": "roles", "type": "left", "on": "roles.id = users.role_id"}],
            "conditions": {"active": true},
            "order": "id DESC",
            "limit": 10,
            "offset": 20,
            "unknown": "ignored"
        }))
        .unwrap();

        assert_eq!(params.table, "users");
        assert_eq!(params.joins.len(), 1);
        assert!(params.conditions.is_some());
        assert_eq!(params.order, vec!["id DESC".to_string()]);
        assert_eq!(params.limit, Some(10));
        assert_eq!(params.offset, Some(20));
    }

    #[test]
    fn test_query_params_rejects_negative_limit() {
        let result = QueryParams::from_json(&json!({"table": "t", "limit": -1}));
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    }

    #[test]
    fn test_or_defaults_keep_caller_values() {
        let params = QueryParams::new("posts").with_limit(5).or_limit(1).or_table("users");
        assert_eq!(params.table, "posts");
        assert_eq!(params.limit, Some(5));
    }
}
