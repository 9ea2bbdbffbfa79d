//! Model-bound CRUD and validation.

use crate::db::{Datasource, SchemaProvider, WriteOutcome};
use crate::entity::rules::FieldRule;
use crate::entity::{FindType, Model, RuleOutcome};
use crate::error::DbResult;
use crate::models::{Condition, QueryParams, Record, TableSchema};
use crate::validation::patterns::Pattern;
use crate::validation::text::scalar_text;
use crate::validation::{Rule, Validator};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_PRIMARY_KEY: &str = "id";

/// Field → failure message from the latest validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, field: &str, message: String) {
        self.0.insert(field.to_string(), message);
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

pub struct EntityManager<M: Model> {
    datasource: Arc<Datasource>,
    model: M,
    table: String,
    schema: TableSchema,
    validator: Validator,
    errors: ValidationErrors,
    last_id: Option<i64>,
    affected_rows: u64,
}

impl<M: Model> std::fmt::Debug for EntityManager<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("datasource", &self.datasource.id())
            .field("table", &self.table)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<M: Model> EntityManager<M> {
    /// Bind `model` to `datasource`, loading the table schema.
    pub async fn new(datasource: Arc<Datasource>, model: M) -> DbResult<Self> {
        let table = model.table_name();
        let schema = datasource.describe_table(&table).await?;
        info!(
            connection = %datasource.id(),
            table = %table,
            columns = schema.columns.len(),
            "Loaded entity schema"
        );
        Ok(Self::with_schema(datasource, model, schema))
    }

    /// Bind with an already known schema. The table name comes from the schema.
    pub fn with_schema(datasource: Arc<Datasource>, model: M, schema: TableSchema) -> Self {
        Self {
            datasource,
            model,
            table: schema.table_name.clone(),
            schema,
            validator: Validator::new(),
            errors: ValidationErrors::default(),
            last_id: None,
            affected_rows: 0,
        }
    }

    /// Replace the validator, e.g. to register country rules.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn datasource(&self) -> &Arc<Datasource> {
        &self.datasource
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// The schema's primary key, or `id` when the table reports none.
    pub fn primary_key(&self) -> &str {
        self.schema.primary_key.as_deref().unwrap_or(DEFAULT_PRIMARY_KEY)
    }

    /// Key generated by the latest insert through this manager.
    pub fn last_id(&self) -> Option<i64> {
        self.last_id
    }

    /// Rows touched by the latest write through this manager.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub async fn find(&self, params: QueryParams, find_type: FindType) -> DbResult<Vec<Record>> {
        let mut params = params.or_table(&self.table);
        if find_type == FindType::First {
            params.limit = Some(1);
        }
        let Some(params) = self.model.before_find(params) else {
            debug!(table = %self.table, "Find cancelled by before_find");
            return Ok(Vec::new());
        };
        let rows = self.datasource.read(&params).await?;
        Ok(self.model.after_find(rows))
    }

    pub async fn all(&self, params: QueryParams) -> DbResult<Vec<Record>> {
        self.find(params, FindType::All).await
    }

    pub async fn first(&self, params: QueryParams) -> DbResult<Option<Record>> {
        Ok(self.find(params, FindType::First).await?.into_iter().next())
    }

    pub async fn count(&self, params: QueryParams) -> DbResult<u64> {
        self.datasource.count(&params.or_table(&self.table)).await
    }

    /// INSERT `data` as given.
    pub async fn insert(&mut self, data: Record) -> DbResult<WriteOutcome> {
        let mut params = QueryParams::new(&self.table).with_data(data);
        if self.datasource.db_type().needs_returning_for_insert_id() {
            params = params.with_returning(self.primary_key());
        }
        let outcome = self.datasource.create(&params).await?;
        self.last_id = outcome.last_insert_id;
        self.affected_rows = outcome.rows_affected;
        Ok(outcome)
    }

    /// UPDATE the rows matched by `params` with `data`.
    pub async fn update(&mut self, params: QueryParams, data: Record) -> DbResult<u64> {
        let params = params.or_table(&self.table).with_values(data);
        let affected = self.datasource.update(&params).await?;
        self.affected_rows = affected;
        Ok(affected)
    }

    /// Insert or update `data`, depending on whether it carries a non-null
    /// primary key. Columns the table does not have are dropped.
    ///
    /// Returns whether a row was written.
    pub async fn save(&mut self, data: Record) -> DbResult<bool> {
        let mut data = data;
        if !self.model.before_save(&mut data) {
            debug!(table = %self.table, "Save halted by before_save");
            return Ok(false);
        }

        let data = data.intersect(&self.schema.column_names());
        let pk = self.primary_key().to_string();
        let id = data.get(&pk).filter(|v| !v.is_null()).cloned();
        let created = id.is_none();

        let saved = match id {
            None => self.insert(data).await?.rows_affected > 0,
            Some(id) => {
                let params = QueryParams::new(&self.table)
                    .with_conditions(Condition::eq(pk.as_str(), id))
                    .with_limit(1);
                self.update(params, data).await? > 0
            }
        };

        debug!(table = %self.table, created, saved, "Saved entity");
        if saved {
            self.model.after_save(created);
        }
        Ok(saved)
    }

    /// Delete the row whose primary key is `id`. Returns whether a row was removed.
    pub async fn delete(&mut self, id: impl Into<JsonValue>) -> DbResult<bool> {
        let id = id.into();
        if !self.model.before_delete(&id) {
            debug!(table = %self.table, "Delete halted by before_delete");
            return Ok(false);
        }
        let params = QueryParams::new(&self.table)
            .with_conditions(Condition::eq(self.primary_key(), &id))
            .with_limit(1);
        let affected = self.datasource.delete(&params).await?;
        self.affected_rows = affected;

        let deleted = affected > 0;
        if deleted {
            self.model.after_delete(&id);
        }
        Ok(deleted)
    }

    /// Record a failure for `field`, replacing any earlier one.
    pub fn invalidate(&mut self, field: &str, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Run the model's rules over `data`. The error map is rebuilt on every call.
    pub fn validate(&mut self, data: &Record) -> &ValidationErrors {
        self.errors.clear();
        self.validator.reset();

        let mut data = data.clone();
        if !self.model.before_validate(&mut data) {
            debug!(table = %self.table, "Validation skipped by before_validate");
            return &self.errors;
        }

        let creating = !data.has_value(self.primary_key());
        let rules = self.model.validation_rules();
        for (field, field_rules) in rules.iter() {
            for rule in field_rules {
                if rule.on.is_some_and(|on| !on.applies(creating)) {
                    continue;
                }
                let failure = match data.get(field) {
                    None if rule.required => Some(rule.failure_message()),
                    None => None,
                    Some(value) if is_empty_value(value) && rule.allow_empty.is_some() => {
                        (rule.allow_empty == Some(false)).then(|| rule.failure_message())
                    }
                    Some(value) => self.apply_rule(rule, field, value, &data),
                };
                if let Some(message) = failure {
                    self.invalidate(field, message);
                    if rule.last {
                        break;
                    }
                }
            }
        }

        if !self.errors.is_empty() {
            debug!(table = %self.table, failures = self.errors.len(), "Validation failed");
        }
        &self.errors
    }

    /// `None` when the rule passes, otherwise the failure message.
    fn apply_rule(&mut self, rule: &FieldRule, field: &str, value: &JsonValue, data: &Record) -> Option<String> {
        let (negated, name) = rule.split_negation();

        if !negated {
            if let Some(outcome) = self.model.custom_rule(name, field, value, &rule.args, data) {
                return match outcome {
                    RuleOutcome::Pass => None,
                    RuleOutcome::Fail => Some(rule.failure_message()),
                    RuleOutcome::FailWith(message) => Some(message),
                };
            }
        }

        let passed = if Rule::is_known(name) {
            match Rule::from_name(name, &rule.args) {
                Ok(engine_rule) => self.validator.check(&engine_rule, value) != negated,
                Err(e) => {
                    warn!(field = %field, rule = %rule.rule, error = %e, "Validation rule misconfigured");
                    false
                }
            }
        } else if negated || !rule.args.is_empty() {
            warn!(field = %field, rule = %rule.rule, "Unknown validation rule");
            false
        } else {
            match Pattern::new(name) {
                Ok(pattern) => scalar_text(value).is_some_and(|text| pattern.is_match(&text)),
                Err(e) => {
                    warn!(field = %field, rule = %rule.rule, error = %e, "Validation rule misconfigured");
                    false
                }
            }
        };

        (!passed).then(|| rule.failure_message())
    }
}

fn is_empty_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null | JsonValue::Bool(false) => true,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!("0")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(" ")));
    }

    #[test]
    fn test_validation_errors_overwrite() {
        let mut errors = ValidationErrors::default();
        errors.insert("name", "first".to_string());
        errors.insert("name", "second".to_string());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("name"), Some("second"));
        assert_eq!(serde_json::to_value(&errors).unwrap(), json!({"name": "second"}));
    }
}
