//! Entity persistence on top of a [`Datasource`](crate::db::Datasource).
//!
//! A [`Model`] describes one table: its name, its validation rules, and the
//! hooks that run around finds, saves, deletes and validation. An
//! [`EntityManager`] binds a model to a datasource and the table's schema.

pub mod inflector;
pub mod manager;
pub mod rules;

pub use manager::{EntityManager, ValidationErrors};
pub use rules::{FieldRule, RuleMessage, RuleOn, ValidationRules, format_message};

use crate::models::{QueryParams, Record};
use serde_json::Value as JsonValue;

/// How many rows a find returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FindType {
    /// At most one row.
    First,
    #[default]
    All,
}

/// Result of a model-local rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Pass,
    /// Fail with the rule's configured message.
    Fail,
    /// Fail with this message instead.
    FailWith(String),
}

impl From<bool> for RuleOutcome {
    fn from(passed: bool) -> Self {
        if passed { Self::Pass } else { Self::Fail }
    }
}

/// A table-backed model.
///
/// Every method has a default, so an empty `impl Model for Post {}` maps
/// `Post` to the `posts` table with no rules and pass-through hooks.
pub trait Model: Send + Sync {
    fn table_name(&self) -> String {
        inflector::tableize(std::any::type_name::<Self>())
    }

    fn validation_rules(&self) -> ValidationRules {
        ValidationRules::default()
    }

    /// Model-local rule named `name`. `None` means the model does not define
    /// it and the engine rules are tried next.
    fn custom_rule(
        &self,
        _name: &str,
        _field: &str,
        _value: &JsonValue,
        _args: &[JsonValue],
        _data: &Record,
    ) -> Option<RuleOutcome> {
        None
    }

    /// May rewrite the query. `None` cancels the find.
    fn before_find(&self, params: QueryParams) -> Option<QueryParams> {
        Some(params)
    }

    fn after_find(&self, rows: Vec<Record>) -> Vec<Record> {
        rows
    }

    /// May rewrite the data. Returning `false` halts the save.
    fn before_save(&self, _data: &mut Record) -> bool {
        true
    }

    fn after_save(&self, _created: bool) {}

    /// Returning `false` halts the delete.
    fn before_delete(&self, _id: &JsonValue) -> bool {
        true
    }

    fn after_delete(&self, _id: &JsonValue) {}

    /// May rewrite the data before rules run. Returning `false` skips the
    /// rules and leaves the error map empty.
    fn before_validate(&self, _data: &mut Record) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BlogPost;
    impl Model for BlogPost {}

    struct Legacy;
    impl Model for Legacy {
        fn table_name(&self) -> String {
            "tbl_legacy".to_string()
        }
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(BlogPost.table_name(), "blog_posts");
        assert_eq!(Legacy.table_name(), "tbl_legacy");
    }

    #[test]
    fn test_rule_outcome_from_bool() {
        assert_eq!(RuleOutcome::from(true), RuleOutcome::Pass);
        assert_eq!(RuleOutcome::from(false), RuleOutcome::Fail);
    }
}
