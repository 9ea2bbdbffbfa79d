//! In-memory representation of one table row.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Column name to scalar value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, JsonValue>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        value
            .as_object()
            .cloned()
            .map(Self)
            .ok_or_else(|| DbError::invalid_input("Record data must be a JSON object"))
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<JsonValue> {
        self.0.shift_remove(column)
    }

    /// True when the column is present and not null.
    pub fn has_value(&self, column: &str) -> bool {
        self.0.get(column).is_some_and(|v| !v.is_null())
    }

    /// Keep only the listed columns, preserving this record's order.
    pub fn intersect<S: AsRef<str>>(&self, columns: &[S]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| columns.iter().any(|c| c.as_ref() == k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &JsonValue> {
        self.0.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, JsonValue> {
        self.0
    }
}

impl From<Map<String, JsonValue>> for Record {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, JsonValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, JsonValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_keeps_insertion_order() {
        let record = Record::new().with("zeta", 1).with("alpha", 2).with("mid", 3);
        let columns: Vec<_> = record.columns().cloned().collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_has_value_treats_null_as_absent() {
        let record = Record::new().with("id", JsonValue::Null).with("name", "a");
        assert!(!record.has_value("id"));
        assert!(record.contains("id"));
        assert!(record.has_value("name"));
        assert!(!record.has_value("missing"));
    }

    #[test]
    fn test_intersect_drops_unknown_columns() {
        let record = Record::from_json(&json!({"id": 1, "name": "a", "bogus": true})).unwrap();
        let filtered = record.intersect(&["id", "name"]);
        assert_eq!(filtered.len(), 2);
        assert!(!filtered.contains("bogus"));
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(Record::from_json(&json!([1, 2])).is_err());
    }
}
