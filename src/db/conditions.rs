//! Condition rendering.
//!
//! [`ConditionParser`] turns a [`Condition`] tree into a SQL fragment plus the
//! values to bind, in placeholder order. The parser owns the placeholder
//! counter so numbered dialects (`$1`, `$2`, ...) can continue after values
//! that were bound earlier in the same statement, such as the SET list of an
//! UPDATE.

use crate::models::{Condition, DatabaseType, QueryParam};

/// Rendered WHERE fragment and its bound values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedCondition {
    pub sql: String,
    pub values: Vec<QueryParam>,
}

impl RenderedCondition {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

#[derive(Debug)]
pub struct ConditionParser {
    db_type: DatabaseType,
    bound: usize,
    values: Vec<QueryParam>,
}

impl ConditionParser {
    pub fn new(db_type: DatabaseType) -> Self {
        Self::with_offset(db_type, 0)
    }

    /// Start numbering after `already_bound` placeholders.
    pub fn with_offset(db_type: DatabaseType, already_bound: usize) -> Self {
        Self {
            db_type,
            bound: already_bound,
            values: Vec::new(),
        }
    }

    pub fn parse(mut self, condition: &Condition) -> RenderedCondition {
        let sql = self.render(condition, true);
        RenderedCondition {
            sql,
            values: self.values,
        }
    }

    fn placeholder(&mut self, value: &QueryParam) -> String {
        self.bound += 1;
        self.values.push(value.clone());
        self.db_type.placeholder(self.bound)
    }

    fn render(&mut self, condition: &Condition, top_level: bool) -> String {
        match condition {
            Condition::Compare { field, op, value } => {
                let ph = self.placeholder(value);
                format!("{} {} {}", field, op.as_sql(), ph)
            }
            Condition::In {
                field,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // nothing is in an empty set
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let placeholders: Vec<String> =
                    values.iter().map(|v| self.placeholder(v)).collect();
                format!(
                    "{} {}IN ({})",
                    field,
                    if *negated { "NOT " } else { "" },
                    placeholders.join(", ")
                )
            }
            Condition::IsNull { field, negated } => {
                format!("{} IS {}NULL", field, if *negated { "NOT " } else { "" })
            }
            Condition::Raw(sql) => sql.trim().to_string(),
            Condition::And(items) => self.render_group(items, " AND ", top_level),
            Condition::Or(items) => self.render_group(items, " OR ", top_level),
            Condition::Not(inner) => {
                let rendered = self.render(inner, true);
                if rendered.is_empty() {
                    rendered
                } else {
                    format!("NOT ({})", rendered)
                }
            }
        }
    }

    fn render_group(&mut self, items: &[Condition], glue: &str, top_level: bool) -> String {
        let rendered: Vec<(bool, String)> = items
            .iter()
            .map(|item| (matches!(item, Condition::Raw(_)), self.render(item, false)))
            .filter(|(_, part)| !part.is_empty())
            .collect();
        // a raw fragment may carry its own AND/OR, so it is grouped next to siblings
        let grouped = rendered.len() > 1;
        let parts: Vec<String> = rendered
            .into_iter()
            .map(|(raw, part)| if raw && grouped { format!("({})", part) } else { part })
            .collect();
        match parts.len() {
            0 => String::new(),
            1 => parts.into_iter().next().unwrap_or_default(),
            _ if top_level => parts.join(glue),
            _ => format!("({})", parts.join(glue)),
        }
    }
}
