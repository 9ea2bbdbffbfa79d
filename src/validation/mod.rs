//! Value validation engine.
//!
//! The checks themselves are pure functions in the submodules. [`Validator`]
//! dispatches a typed [`Rule`] to them, resolves country rules and deep email
//! lookups through its collaborators, and records one [`Diagnostic`] per
//! evaluation.
//!
//! Misconfiguration (an unknown operator, a missing regex, an unregistered
//! country) is never a validation failure in itself: [`Validator::try_check`]
//! returns it as a [`RuleError`], while [`Validator::check`] logs a warning and
//! fails closed.

pub mod datetime;
pub mod locale;
pub mod network;
pub mod numeric;
pub mod patterns;
pub mod rule;
pub mod text;

pub use datetime::{DateFormat, DateOptions};
pub use locale::{CountryRegistry, CountryRules, LocaleOptions, LocaleRule, PatternRules};
pub use network::{DomainResolver, IpVersion, SystemResolver};
pub use numeric::{CardSelection, CardType, CcOptions, CompareOp, MultipleOptions, SymbolPosition};
pub use patterns::Pattern;
pub use rule::Rule;

use crate::error::RuleError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{trace, warn};

static NULL: JsonValue = JsonValue::Null;

/// One evaluation, kept for debugging. Never affects results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub rule: String,
    pub failed: bool,
    /// Set when the rule was misconfigured.
    pub warning: Option<String>,
}

/// Per-validator trace of evaluations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Diagnostic> {
        self.entries.last()
    }

    /// Entries that carry a configuration warning.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.warning.is_some())
    }

    fn push(&mut self, rule: &str, failed: bool, warning: Option<String>) {
        self.entries.push(Diagnostic {
            rule: rule.to_string(),
            failed,
            warning,
        });
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Validation service: rule dispatch plus collaborators.
#[derive(Clone)]
pub struct Validator {
    countries: CountryRegistry,
    resolver: Arc<dyn DomainResolver>,
    diagnostics: Diagnostics,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("countries", &self.countries)
            .field("diagnostics", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// No registered countries; deep email checks use the system resolver.
    pub fn new() -> Self {
        Self {
            countries: CountryRegistry::new(),
            resolver: Arc::new(SystemResolver),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_countries(mut self, countries: CountryRegistry) -> Self {
        self.countries = countries;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DomainResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn countries(&self) -> &CountryRegistry {
        &self.countries
    }

    pub fn countries_mut(&mut self) -> &mut CountryRegistry {
        &mut self.countries
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Clear the diagnostic trace.
    pub fn reset(&mut self) {
        self.diagnostics.clear();
    }

    /// Evaluate `rule`, reporting misconfiguration as an error.
    pub fn try_check(&mut self, rule: &Rule, value: &JsonValue) -> Result<bool, RuleError> {
        let result = self.evaluate(rule, value);
        match &result {
            Ok(passed) => self.diagnostics.push(rule.name(), !passed, None),
            Err(e) => self.diagnostics.push(rule.name(), true, Some(e.to_string())),
        }
        trace!(rule = rule.name(), result = ?result, "Evaluated rule");
        result
    }

    /// Evaluate `rule`. Misconfiguration is logged and fails closed.
    pub fn check(&mut self, rule: &Rule, value: &JsonValue) -> bool {
        match self.try_check(rule, value) {
            Ok(passed) => passed,
            Err(e) => {
                warn!(rule = rule.name(), error = %e, "Validation rule misconfigured");
                false
            }
        }
    }

    /// Build the rule from `name` and `args`, then [`check`](Self::check) it.
    /// An unknown name or bad arguments fail closed.
    pub fn check_named(&mut self, name: &str, args: &[JsonValue], value: &JsonValue) -> bool {
        match Rule::from_name(name, args) {
            Ok(rule) => self.check(&rule, value),
            Err(e) => {
                warn!(rule = %name, error = %e, "Validation rule misconfigured");
                self.diagnostics.push(name, true, Some(e.to_string()));
                false
            }
        }
    }

    fn evaluate(&self, rule: &Rule, value: &JsonValue) -> Result<bool, RuleError> {
        // rules over structured values
        match rule {
            Rule::Boolean => return Ok(text::boolean(value)),
            Rule::EqualTo(expected) => return Ok(text::equal_to(value, expected)),
            Rule::InList(list) => return Ok(text::in_list(value, list)),
            Rule::Multiple(options) => return Ok(numeric::multiple(value, options)),
            Rule::Numeric if value.is_number() => return Ok(true),
            Rule::Extension(list) => {
                // an upload array is checked by its first entry
                let first = match value {
                    JsonValue::Array(items) => items.first().unwrap_or(&NULL),
                    other => other,
                };
                return Ok(text::scalar_text(first).is_some_and(|s| text::extension(&s, list)));
            }
            _ => {}
        }

        let Some(rendered) = text::scalar_text(value) else {
            return Ok(false);
        };
        let s = rendered.as_ref();

        let passed = match rule {
            Rule::NotEmpty => text::not_empty(s),
            Rule::AlphaNumeric => text::alpha_numeric(s),
            Rule::Between { min, max } => text::between(s, *min, *max),
            Rule::Blank => text::blank(s),
            Rule::Cc(options) => numeric::cc(s, options),
            Rule::Comparison { operator, other } => {
                let op = CompareOp::parse(operator)
                    .ok_or_else(|| RuleError::unknown_operator(operator.as_str()))?;
                let Some(other) = text::scalar_text(other) else {
                    return Ok(false);
                };
                numeric::comparison(s, op, &other)
            }
            Rule::Custom { regex } => {
                let regex = regex
                    .as_ref()
                    .ok_or_else(|| RuleError::missing_regex("custom"))?;
                text::custom(s, regex)
            }
            Rule::Date(options) => datetime::date(s, options),
            Rule::DateTime(options) => datetime::datetime(s, options),
            Rule::Time => datetime::time(s),
            Rule::Decimal { places, regex } => match regex {
                Some(regex) => regex.is_match(s),
                None => numeric::decimal(s, *places),
            },
            Rule::Email { deep: false, regex } => network::email(s, regex.as_ref()),
            Rule::Email { deep: true, regex } => {
                network::email_deep(s, regex.as_ref(), self.resolver.as_ref())
            }
            Rule::Ip(version) => network::ip(s, *version),
            Rule::MinLength(min) => text::min_length(s, *min),
            Rule::MaxLength(max) => text::max_length(s, *max),
            Rule::Money(position) => numeric::money(s, *position),
            Rule::Numeric => numeric::numeric(s),
            Rule::Phone(_) | Rule::Postal(_) | Rule::Ssn(_) => match rule.locale() {
                Some((kind, options)) => locale::check(kind, s, options, &self.countries)?,
                None => false,
            },
            Rule::Range { lower, upper } => numeric::range(s, *lower, *upper),
            Rule::Url { strict } => network::url(s, *strict),
            Rule::Uuid => text::uuid(s),
            Rule::Luhn { deep } => numeric::luhn(s, *deep),
            Rule::Boolean
            | Rule::EqualTo(_)
            | Rule::InList(_)
            | Rule::Multiple(_)
            | Rule::Extension(_) => false,
        };
        Ok(passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoDns;

    impl DomainResolver for NoDns {
        fn has_mx(&self, _domain: &str) -> bool {
            false
        }

        fn has_address(&self, _domain: &str) -> bool {
            false
        }
    }

    fn validator() -> Validator {
        Validator::new().with_resolver(Arc::new(NoDns))
    }

    #[test]
    fn test_check_records_diagnostics() {
        let mut v = validator();
        assert!(v.check(&Rule::NotEmpty, &json!("x")));
        assert!(!v.check(&Rule::NotEmpty, &json!("")));
        assert_eq!(v.diagnostics().len(), 2);
        assert_eq!(
            v.diagnostics().last(),
            Some(&Diagnostic {
                rule: "notEmpty".to_string(),
                failed: true,
                warning: None
            })
        );
        v.reset();
        assert!(v.diagnostics().is_empty());
    }

    #[test]
    fn test_unknown_operator_fails_closed() {
        let mut v = validator();
        let rule = Rule::Comparison {
            operator: "~=".to_string(),
            other: json!(1),
        };
        assert_eq!(
            v.try_check(&rule, &json!(1)),
            Err(RuleError::unknown_operator("~="))
        );
        assert!(!v.check(&rule, &json!(1)));
        assert_eq!(v.diagnostics().warnings().count(), 2);
    }

    #[test]
    fn test_custom_without_regex_fails_closed() {
        let mut v = validator();
        let rule = Rule::Custom { regex: None };
        assert_eq!(
            v.try_check(&rule, &json!("abc")),
            Err(RuleError::missing_regex("custom"))
        );
        assert!(!v.check(&rule, &json!("abc")));
    }

    #[test]
    fn test_unregistered_country() {
        let mut v = validator();
        let rule = Rule::Postal(LocaleOptions::country("fr"));
        assert_eq!(
            v.try_check(&rule, &json!("75001")),
            Err(RuleError::unsupported_country("postal", "fr"))
        );

        let mut v = validator().with_countries(
            CountryRegistry::new().with("fr", PatternRules::new().with_postal(r"^\d{5}$").unwrap()),
        );
        assert_eq!(v.try_check(&rule, &json!("75001")), Ok(true));
    }

    #[test]
    fn test_numbers_are_checked_as_text() {
        let mut v = validator();
        assert!(v.check(&Rule::Range { lower: Some(1.0), upper: Some(10.0) }, &json!(5)));
        assert!(v.check(&Rule::Numeric, &json!(2.5)));
        assert!(v.check(&Rule::Between { min: 1, max: 3 }, &json!(123)));
        assert!(!v.check(&Rule::NotEmpty, &json!(null)));
    }

    #[test]
    fn test_structured_value_fails_text_rules() {
        let mut v = validator();
        assert!(!v.check(&Rule::NotEmpty, &json!(["a"])));
        assert!(!v.check(&Rule::Email { deep: false, regex: None }, &json!({"a": 1})));
    }

    #[test]
    fn test_email_deep_requires_resolution() {
        let mut v = validator();
        let deep = Rule::Email { deep: true, regex: None };
        assert!(!v.check(&deep, &json!("user@")));
        assert!(!v.check(&deep, &json!("user@example.com")));
        assert!(v.check(&Rule::Email { deep: false, regex: None }, &json!("user@example.com")));
    }

    #[test]
    fn test_extension_of_upload_array() {
        let mut v = validator();
        let rule = Rule::from_name("extension", &[]).unwrap();
        assert!(v.check(&rule, &json!(["photo.png", "ignored.exe"])));
        assert!(!v.check(&rule, &json!("script.exe")));
    }

    #[test]
    fn test_check_named() {
        let mut v = validator();
        assert!(v.check_named("between", &[json!(1), json!(10)], &json!("hello")));
        assert!(!v.check_named("nope", &[], &json!("hello")));
        assert!(v.diagnostics().last().is_some_and(|d| d.warning.is_some()));
    }
}
