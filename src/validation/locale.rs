//! Country-specific phone, postal code and SSN checks.
//!
//! A handful of countries have built-in patterns. Anything else is looked up
//! in a [`CountryRegistry`] of [`CountryRules`] implementations keyed by the
//! lowercase country code.

use crate::error::RuleError;
use crate::validation::patterns::{Pattern, builtin};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

// includes all NANPA members
static NANPA_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^(?:\+?1)?[-. ]?\(?[2-9][0-8][0-9]\)?[-. ]?[2-9][0-9]{2}[-. ]?[0-9]{4}$")
});

static POSTAL: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    HashMap::from([
        (
            "uk",
            builtin(r"(?i)\A\b[A-Z]{1,2}[0-9][A-Z0-9]? [0-9][ABD-HJLNP-UW-Z]{2}\b\z"),
        ),
        (
            "ca",
            builtin(r"(?i)\A\b[ABCEGHJKLMNPRSTVXY][0-9][A-Z] [0-9][A-Z][0-9]\b\z"),
        ),
        ("it", builtin(r"^[0-9]{5}$")),
        ("de", builtin(r"^[0-9]{5}$")),
        ("be", builtin(r"^[1-9][0-9]{3}$")),
        ("us", builtin(r"\A\b[0-9]{5}(?:-[0-9]{4})?\b\z")),
    ])
});

static SSN: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    HashMap::from([
        ("dk", builtin(r"\A\b[0-9]{6}-[0-9]{4}\b\z")),
        ("nl", builtin(r"\A\b[0-9]{9}\b\z")),
        ("us", builtin(r"\A\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b\z")),
    ])
});

/// The three country-dependent checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocaleRule {
    Phone,
    Postal,
    Ssn,
}

impl LocaleRule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Postal => "postal",
            Self::Ssn => "ssn",
        }
    }

    /// Country used when none is given. SSN has no default.
    pub fn default_country(&self) -> Option<&'static str> {
        match self {
            Self::Phone => Some("all"),
            Self::Postal => Some("us"),
            Self::Ssn => None,
        }
    }

    /// Built-in pattern for `country`, if there is one.
    pub fn builtin(&self, country: &str) -> Option<&'static Regex> {
        match self {
            Self::Phone => matches!(country, "us" | "can" | "all").then_some(&*NANPA_PHONE),
            Self::Postal => POSTAL.get(country),
            Self::Ssn => SSN.get(country),
        }
    }
}

impl fmt::Display for LocaleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pattern override and country for `phone`, `postal` and `ssn`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleOptions {
    /// Used instead of any country pattern.
    pub regex: Option<Pattern>,
    /// Lowercase country code; `None` uses the rule's default.
    pub country: Option<String>,
}

impl LocaleOptions {
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            regex: None,
            country: Some(country.into().to_lowercase()),
        }
    }
}

/// Validation rules for one country.
///
/// Each method returns `None` when the country has no such rule.
pub trait CountryRules: Send + Sync {
    fn phone(&self, _value: &str) -> Option<bool> {
        None
    }

    fn postal(&self, _value: &str) -> Option<bool> {
        None
    }

    fn ssn(&self, _value: &str) -> Option<bool> {
        None
    }
}

/// Country rules defined by plain patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternRules {
    phone: Option<Pattern>,
    postal: Option<Pattern>,
    ssn: Option<Pattern>,
}

impl PatternRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phone(mut self, pattern: &str) -> Result<Self, RuleError> {
        self.phone = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn with_postal(mut self, pattern: &str) -> Result<Self, RuleError> {
        self.postal = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn with_ssn(mut self, pattern: &str) -> Result<Self, RuleError> {
        self.ssn = Some(Pattern::new(pattern)?);
        Ok(self)
    }
}

impl CountryRules for PatternRules {
    fn phone(&self, value: &str) -> Option<bool> {
        self.phone.as_ref().map(|p| p.is_match(value))
    }

    fn postal(&self, value: &str) -> Option<bool> {
        self.postal.as_ref().map(|p| p.is_match(value))
    }

    fn ssn(&self, value: &str) -> Option<bool> {
        self.ssn.as_ref().map(|p| p.is_match(value))
    }
}

/// Country code → rule set.
#[derive(Clone, Default)]
pub struct CountryRegistry {
    countries: HashMap<String, Arc<dyn CountryRules>>,
}

impl fmt::Debug for CountryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<&String> = self.countries.keys().collect();
        codes.sort();
        f.debug_struct("CountryRegistry")
            .field("countries", &codes)
            .finish()
    }
}

impl CountryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the rules for `country`.
    pub fn register(&mut self, country: &str, rules: Arc<dyn CountryRules>) {
        self.countries.insert(country.to_lowercase(), rules);
    }

    pub fn with(mut self, country: &str, rules: impl CountryRules + 'static) -> Self {
        self.register(country, Arc::new(rules));
        self
    }

    pub fn get(&self, country: &str) -> Option<&Arc<dyn CountryRules>> {
        self.countries.get(&country.to_lowercase())
    }

    pub fn contains(&self, country: &str) -> bool {
        self.countries.contains_key(&country.to_lowercase())
    }

    /// Run `rule` through the registered set for `country`.
    pub fn check(&self, rule: LocaleRule, country: &str, value: &str) -> Result<bool, RuleError> {
        let rules = self
            .get(country)
            .ok_or_else(|| RuleError::unsupported_country(rule.name(), country))?;
        let outcome = match rule {
            LocaleRule::Phone => rules.phone(value),
            LocaleRule::Postal => rules.postal(value),
            LocaleRule::Ssn => rules.ssn(value),
        };
        outcome.ok_or_else(|| RuleError::missing_country_rule(rule.name(), country))
    }
}

/// Override pattern, then built-in pattern, then the registry.
pub fn check(
    rule: LocaleRule,
    value: &str,
    options: &LocaleOptions,
    registry: &CountryRegistry,
) -> Result<bool, RuleError> {
    if let Some(regex) = &options.regex {
        return Ok(regex.is_match(value));
    }
    let country = match options.country.as_deref().or(rule.default_country()) {
        Some(country) => country.to_lowercase(),
        None => {
            return Err(RuleError::invalid_argument(
                rule.name(),
                "a country or a regex is required",
            ));
        }
    };
    match rule.builtin(&country) {
        Some(regex) => Ok(regex.is_match(value)),
        None => registry.check(rule, &country, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CountryRegistry {
        CountryRegistry::new().with(
            "fr",
            PatternRules::new()
                .with_postal(r"^\d{5}$")
                .unwrap()
                .with_phone(r"^0[1-9](?: ?\d{2}){4}$")
                .unwrap(),
        )
    }

    fn run(rule: LocaleRule, value: &str, country: Option<&str>) -> Result<bool, RuleError> {
        let options = LocaleOptions {
            regex: None,
            country: country.map(String::from),
        };
        check(rule, value, &options, &registry())
    }

    #[test]
    fn test_nanpa_phone() {
        assert_eq!(run(LocaleRule::Phone, "(555) 555-1234", None), Ok(true));
        assert_eq!(run(LocaleRule::Phone, "+1 212.555.0199", Some("us")), Ok(true));
        assert_eq!(run(LocaleRule::Phone, "555-1234", Some("can")), Ok(false));
        assert_eq!(run(LocaleRule::Phone, "(155) 555-1234", None), Ok(false));
    }

    #[test]
    fn test_builtin_postal_codes() {
        assert_eq!(run(LocaleRule::Postal, "12345", None), Ok(true));
        assert_eq!(run(LocaleRule::Postal, "12345-6789", None), Ok(true));
        assert_eq!(run(LocaleRule::Postal, "1234", None), Ok(false));
        assert_eq!(run(LocaleRule::Postal, "SW1A 1AA", Some("uk")), Ok(true));
        assert_eq!(run(LocaleRule::Postal, "sw1a 1aa", Some("UK")), Ok(true));
        assert_eq!(run(LocaleRule::Postal, "K1A 0B1", Some("ca")), Ok(true));
        assert_eq!(run(LocaleRule::Postal, "D1A 0B1", Some("ca")), Ok(false));
        assert_eq!(run(LocaleRule::Postal, "10115", Some("de")), Ok(true));
        assert_eq!(run(LocaleRule::Postal, "1000", Some("be")), Ok(true));
        assert_eq!(run(LocaleRule::Postal, "0999", Some("be")), Ok(false));
    }

    #[test]
    fn test_builtin_ssn() {
        assert_eq!(run(LocaleRule::Ssn, "123-45-6789", Some("us")), Ok(true));
        assert_eq!(run(LocaleRule::Ssn, "123456-7890", Some("dk")), Ok(true));
        assert_eq!(run(LocaleRule::Ssn, "123456789", Some("nl")), Ok(true));
        assert_eq!(run(LocaleRule::Ssn, "12345678", Some("nl")), Ok(false));
        assert!(matches!(
            run(LocaleRule::Ssn, "123-45-6789", None),
            Err(RuleError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_registry_delegation() {
        assert_eq!(run(LocaleRule::Postal, "75001", Some("fr")), Ok(true));
        assert_eq!(run(LocaleRule::Phone, "01 23 45 67 89", Some("fr")), Ok(true));
        assert_eq!(
            run(LocaleRule::Ssn, "1", Some("fr")),
            Err(RuleError::missing_country_rule("ssn", "fr"))
        );
        assert_eq!(
            run(LocaleRule::Postal, "1", Some("jp")),
            Err(RuleError::unsupported_country("postal", "jp"))
        );
    }

    #[test]
    fn test_regex_override_wins() {
        let options = LocaleOptions {
            regex: Some(Pattern::new(r"^X\d$").unwrap()),
            country: Some("jp".to_string()),
        };
        assert_eq!(
            check(LocaleRule::Postal, "X1", &options, &CountryRegistry::new()),
            Ok(true)
        );
    }

    #[test]
    fn test_registry_debug_lists_codes() {
        let debug = format!("{:?}", registry());
        assert!(debug.contains("fr"));
    }
}
