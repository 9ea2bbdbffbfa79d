//! Structured WHERE clauses.
//!
//! A [`Condition`] is the tree form of a WHERE clause before rendering. It can be
//! built with the constructor helpers or from the declarative JSON form:
//!
//! ```text
//! {"status": "active"}                 status = ?
//! {"age >=": 18}                       age >= ?
//! {"role": ["admin", "staff"]}         role IN (?, ?)
//! {"deleted_at": null}                 deleted_at IS NULL
//! {"or": {"a": 1, "b": 2}}             (a = ? OR b = ?)
//! ["price > cost"]                     price > cost
//! ```

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use serde_json::Value as JsonValue;

/// Comparison operator of a single `field op value` test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" | "NOT" => Some(Self::NotEq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "LIKE" => Some(Self::Like),
            "NOT LIKE" => Some(Self::NotLike),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Self::NotEq | Self::NotLike)
    }

    /// Only equality tests have a list (`IN`) or null (`IS NULL`) form.
    pub fn accepts_set(&self) -> bool {
        matches!(self, Self::Eq | Self::NotEq)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: Operator,
        value: QueryParam,
    },
    In {
        field: String,
        values: Vec<QueryParam>,
        negated: bool,
    },
    IsNull {
        field: String,
        negated: bool,
    },
    /// SQL fragment emitted verbatim, binding nothing.
    Raw(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    /// A null value becomes `IS [NOT] NULL` for `=` and `!=`. Other operators
    /// bind the null as is.
    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<QueryParam>) -> Self {
        let field = field.into();
        match value.into() {
            QueryParam::Null if op.accepts_set() => Self::IsNull {
                field,
                negated: op.is_negative(),
            },
            value => Self::Compare { field, op, value },
        }
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryParam>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::And(conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::Or(conditions)
    }

    pub fn negate(condition: Condition) -> Self {
        Self::Not(Box::new(condition))
    }

    /// True for an empty group, which renders to nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(items) | Self::Or(items) => items.iter().all(Condition::is_empty),
            Self::Not(inner) => inner.is_empty(),
            Self::Raw(sql) => sql.trim().is_empty(),
            _ => false,
        }
    }

    /// Parse the declarative JSON form. Top-level object entries are joined
    /// with AND.
    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Null => Ok(Self::And(Vec::new())),
            JsonValue::String(sql) => Ok(Self::Raw(sql.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<DbResult<Vec<_>>>()
                .map(Self::And),
            JsonValue::Object(map) => map
                .iter()
                .map(|(key, value)| Self::from_entry(key, value))
                .collect::<DbResult<Vec<_>>>()
                .map(|mut items| {
                    if items.len() == 1 {
                        items.remove(0)
                    } else {
                        Self::And(items)
                    }
                }),
            other => Err(DbError::invalid_input(format!(
                "Unsupported condition: {}",
                other
            ))),
        }
    }

    fn from_entry(key: &str, value: &JsonValue) -> DbResult<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "and" => return Self::group(value).map(Self::And),
            "or" => return Self::group(value).map(Self::Or),
            "not" => return Self::from_json(value).map(Self::negate),
            _ => {}
        }

        let (field, op) = split_key(key)?;
        if (value.is_array() || value.is_null()) && !op.accepts_set() {
            return Err(DbError::invalid_input(format!(
                "Operator '{}' in '{}' cannot take a list or null",
                op.as_sql(),
                key
            )));
        }
        match value {
            JsonValue::Array(items) => Ok(Self::In {
                field,
                values: items.iter().map(QueryParam::from).collect(),
                negated: op.is_negative(),
            }),
            JsonValue::Object(_) => Err(DbError::invalid_input(format!(
                "Condition value for '{}' cannot be an object",
                key
            ))),
            scalar => Ok(Self::compare(field, op, QueryParam::from(scalar))),
        }
    }

    fn group(value: &JsonValue) -> DbResult<Vec<Condition>> {
        match value {
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| Self::from_entry(k, v))
                .collect(),
            JsonValue::Array(items) => items.iter().map(Self::from_json).collect(),
            other => Ok(vec![Self::from_json(other)?]),
        }
    }
}

/// Split `"age >="` into the field and the operator; a bare field means `=`.
fn split_key(key: &str) -> DbResult<(String, Operator)> {
    let key = key.trim();
    let Some(space) = key.find(char::is_whitespace) else {
        return Ok((key.to_string(), Operator::Eq));
    };
    let (field, op) = key.split_at(space);
    let op = Operator::parse(op).ok_or_else(|| {
        DbError::invalid_input(format!("Unknown operator in condition key '{}'", key))
    })?;
    Ok((field.to_string(), op))
}
