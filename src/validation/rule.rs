//! Typed validation rules.
//!
//! A [`Rule`] names one check together with its parameters. Rules are usually
//! built from a name plus positional JSON arguments, the same shape a model's
//! rule set uses:
//!
//! ```text
//! "email"                             → Rule::Email
//! ["between", 5, 15]                  → Rule::Between { min: 5, max: 15 }
//! ["postal", null, "uk"]              → Rule::Postal(country "uk")
//! {"rule": "cc", "deep": true}        → Rule::Cc(deep)
//! ```

use crate::error::RuleError;
use crate::validation::datetime::{DateFormat, DateOptions};
use crate::validation::locale::{LocaleOptions, LocaleRule};
use crate::validation::network::IpVersion;
use crate::validation::numeric::{CardSelection, CardType, CcOptions, MultipleOptions, SymbolPosition};
use crate::validation::patterns::Pattern;
use crate::validation::text::DEFAULT_EXTENSIONS;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    NotEmpty,
    AlphaNumeric,
    Between { min: usize, max: usize },
    Blank,
    Cc(CcOptions),
    Comparison { operator: String, other: JsonValue },
    /// `None` is a configuration error reported at check time.
    Custom { regex: Option<Pattern> },
    Date(DateOptions),
    DateTime(DateOptions),
    Time,
    Boolean,
    Decimal { places: Option<u32>, regex: Option<Pattern> },
    /// With `deep`, the domain must also have an MX or address record.
    Email { deep: bool, regex: Option<Pattern> },
    EqualTo(JsonValue),
    Extension(Vec<String>),
    Ip(IpVersion),
    MinLength(usize),
    MaxLength(usize),
    Money(SymbolPosition),
    Multiple(MultipleOptions),
    Numeric,
    Phone(LocaleOptions),
    Postal(LocaleOptions),
    Ssn(LocaleOptions),
    Range { lower: Option<f64>, upper: Option<f64> },
    Url { strict: bool },
    InList(Vec<JsonValue>),
    Uuid,
    Luhn { deep: bool },
}

impl Rule {
    /// Canonical camelCase name, as used in rule sets.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotEmpty => "notEmpty",
            Self::AlphaNumeric => "alphaNumeric",
            Self::Between { .. } => "between",
            Self::Blank => "blank",
            Self::Cc(_) => "cc",
            Self::Comparison { .. } => "comparison",
            Self::Custom { .. } => "custom",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Time => "time",
            Self::Boolean => "boolean",
            Self::Decimal { .. } => "decimal",
            Self::Email { .. } => "email",
            Self::EqualTo(_) => "equalTo",
            Self::Extension(_) => "extension",
            Self::Ip(_) => "ip",
            Self::MinLength(_) => "minLength",
            Self::MaxLength(_) => "maxLength",
            Self::Money(_) => "money",
            Self::Multiple(_) => "multiple",
            Self::Numeric => "numeric",
            Self::Phone(_) => "phone",
            Self::Postal(_) => "postal",
            Self::Ssn(_) => "ssn",
            Self::Range { .. } => "range",
            Self::Url { .. } => "url",
            Self::InList(_) => "inList",
            Self::Uuid => "uuid",
            Self::Luhn { .. } => "luhn",
        }
    }

    /// Whether `name` refers to an engine rule. Case and underscores are ignored.
    pub fn is_known(name: &str) -> bool {
        canonical(name).is_some()
    }

    /// Build a rule from its name and positional arguments.
    ///
    /// Arguments follow the rule's parameter order; `null` keeps a default.
    pub fn from_name(name: &str, args: &[JsonValue]) -> Result<Self, RuleError> {
        let key = canonical(name).ok_or_else(|| RuleError::unknown_rule(name))?;
        let args = Args { rule: key, values: args };

        let rule = match key {
            "notempty" => Self::NotEmpty,
            "alphanumeric" => Self::AlphaNumeric,
            "between" => Self::Between {
                min: args.required_usize(0)?,
                max: args.required_usize(1)?,
            },
            "blank" => Self::Blank,
            "cc" => Self::Cc(CcOptions {
                types: args.card_selection(0)?,
                deep: args.bool(1)?.unwrap_or(false),
                regex: args.pattern(2)?,
            }),
            "comparison" => Self::Comparison {
                operator: args.string(0)?.unwrap_or_default(),
                other: args.value(1).cloned().unwrap_or(JsonValue::Null),
            },
            "custom" => Self::Custom {
                regex: args.pattern(0)?,
            },
            "date" => Self::Date(args.date_options()?),
            "datetime" => Self::DateTime(args.date_options()?),
            "time" => Self::Time,
            "boolean" => Self::Boolean,
            "decimal" => Self::Decimal {
                places: args.u32(0)?,
                regex: args.pattern(1)?,
            },
            "email" => Self::Email {
                deep: args.bool(0)?.unwrap_or(false),
                regex: args.pattern(1)?,
            },
            "equalto" => Self::EqualTo(args.value(0).cloned().unwrap_or(JsonValue::Null)),
            "extension" => Self::Extension(match args.list(0)? {
                Some(list) => list.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
                None => DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            }),
            "ip" => Self::Ip(match args.string(0)? {
                Some(name) => IpVersion::from_name(&name)
                    .ok_or_else(|| RuleError::invalid_argument("ip", format!("unknown IP version '{}'", name)))?,
                None => IpVersion::Both,
            }),
            "minlength" => Self::MinLength(args.required_usize(0)?),
            "maxlength" => Self::MaxLength(args.required_usize(0)?),
            "money" => Self::Money(match args.string(0)?.as_deref() {
                None | Some("left") => SymbolPosition::Left,
                Some("right") => SymbolPosition::Right,
                Some(other) => {
                    return Err(RuleError::invalid_argument(
                        "money",
                        format!("symbol position must be 'left' or 'right', got '{}'", other),
                    ));
                }
            }),
            "multiple" => Self::Multiple(match args.value(0) {
                None | Some(JsonValue::Null) => MultipleOptions::default(),
                Some(options) => serde_json::from_value(options.clone())
                    .map_err(|e| RuleError::invalid_argument("multiple", e.to_string()))?,
            }),
            "numeric" => Self::Numeric,
            "phone" => Self::Phone(args.locale_options()?),
            "postal" => Self::Postal(args.locale_options()?),
            "ssn" => Self::Ssn(args.locale_options()?),
            "range" => Self::Range {
                lower: args.f64(0)?,
                upper: args.f64(1)?,
            },
            "url" => Self::Url {
                strict: args.bool(0)?.unwrap_or(false),
            },
            "inlist" => Self::InList(args.list(0)?.cloned().unwrap_or_default()),
            "uuid" => Self::Uuid,
            "luhn" => Self::Luhn {
                deep: args.bool(0)?.unwrap_or(false),
            },
            _ => return Err(RuleError::unknown_rule(name)),
        };
        Ok(rule)
    }

    /// Build a rule from its JSON description.
    ///
    /// Accepts a name, a `[name, args...]` array, or an object with a `rule`
    /// key (name or array) plus the named options `regex`, `country`, `deep`
    /// and `type`. Other keys are ignored.
    pub fn from_json(value: &JsonValue) -> Result<Self, RuleError> {
        match value {
            JsonValue::String(name) => Self::from_name(name, &[]),
            JsonValue::Array(items) => match items.split_first() {
                Some((JsonValue::String(name), args)) => Self::from_name(name, args),
                _ => Err(RuleError::invalid_argument(
                    "rule",
                    "a rule array must start with the rule name",
                )),
            },
            JsonValue::Object(map) => {
                let inner = map.get("rule").ok_or_else(|| {
                    RuleError::invalid_argument("rule", "missing 'rule' key")
                })?;
                let mut rule = Self::from_json(inner)?;
                for (key, option) in map.iter().filter(|(key, _)| key.as_str() != "rule") {
                    rule.apply_named(key, option)?;
                }
                Ok(rule)
            }
            other => Err(RuleError::invalid_argument(
                "rule",
                format!("expected a rule name, array or object, got {}", other),
            )),
        }
    }

    /// Apply one named option (`regex`, `country`, `deep`, `type`).
    fn apply_named(&mut self, key: &str, value: &JsonValue) -> Result<(), RuleError> {
        let rule = self.name();
        let args = Args {
            rule,
            values: std::slice::from_ref(value),
        };
        match (key, self) {
            ("regex", Self::Cc(o)) => o.regex = args.pattern(0)?,
            ("regex", Self::Custom { regex }) => *regex = args.pattern(0)?,
            ("regex", Self::Date(o) | Self::DateTime(o)) => o.regex = args.pattern(0)?,
            ("regex", Self::Decimal { regex, .. }) => *regex = args.pattern(0)?,
            ("regex", Self::Email { regex, .. }) => *regex = args.pattern(0)?,
            ("regex", Self::Phone(o) | Self::Postal(o) | Self::Ssn(o)) => o.regex = args.pattern(0)?,
            ("country", Self::Phone(o) | Self::Postal(o) | Self::Ssn(o)) => {
                o.country = args.string(0)?.map(|c| c.to_lowercase())
            }
            ("deep", Self::Cc(o)) => o.deep = args.bool(0)?.unwrap_or(false),
            ("deep", Self::Email { deep, .. } | Self::Luhn { deep }) => {
                *deep = args.bool(0)?.unwrap_or(false)
            }
            ("type", Self::Cc(o)) => o.types = args.card_selection(0)?,
            ("type", Self::Ip(version)) => {
                if let Some(name) = args.string(0)? {
                    *version = IpVersion::from_name(&name).ok_or_else(|| {
                        RuleError::invalid_argument(rule, format!("unknown IP version '{}'", name))
                    })?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The locale kind for `phone`, `postal` and `ssn`.
    pub fn locale(&self) -> Option<(LocaleRule, &LocaleOptions)> {
        match self {
            Self::Phone(o) => Some((LocaleRule::Phone, o)),
            Self::Postal(o) => Some((LocaleRule::Postal, o)),
            Self::Ssn(o) => Some((LocaleRule::Ssn, o)),
            _ => None,
        }
    }
}

/// Lowercased name without underscores, if it is a known rule.
fn canonical(name: &str) -> Option<&'static str> {
    const NAMES: &[&str] = &[
        "notempty",
        "alphanumeric",
        "between",
        "blank",
        "cc",
        "comparison",
        "custom",
        "date",
        "datetime",
        "time",
        "boolean",
        "decimal",
        "email",
        "equalto",
        "extension",
        "ip",
        "minlength",
        "maxlength",
        "money",
        "multiple",
        "numeric",
        "phone",
        "postal",
        "ssn",
        "range",
        "url",
        "inlist",
        "uuid",
        "luhn",
    ];
    let key: String = name
        .trim()
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_lowercase();
    NAMES.iter().copied().find(|n| *n == key)
}

/// Positional argument accessors with rule-scoped errors.
struct Args<'a> {
    rule: &'a str,
    values: &'a [JsonValue],
}

impl<'a> Args<'a> {
    fn value(&self, index: usize) -> Option<&'a JsonValue> {
        self.values.get(index).filter(|v| !v.is_null())
    }

    fn invalid(&self, index: usize, expected: &str) -> RuleError {
        RuleError::invalid_argument(
            self.rule,
            format!("argument {} must be {}", index + 1, expected),
        )
    }

    fn string(&self, index: usize) -> Result<Option<String>, RuleError> {
        match self.value(index) {
            None => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.clone())),
            Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(self.invalid(index, "a string")),
        }
    }

    fn bool(&self, index: usize) -> Result<Option<bool>, RuleError> {
        match self.value(index) {
            None => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(JsonValue::Number(n)) => Ok(Some(n.as_f64().is_some_and(|f| f != 0.0))),
            Some(JsonValue::String(s)) => match s.to_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" | "" => Ok(Some(false)),
                _ => Err(self.invalid(index, "a boolean")),
            },
            Some(_) => Err(self.invalid(index, "a boolean")),
        }
    }

    fn f64(&self, index: usize) -> Result<Option<f64>, RuleError> {
        match self.value(index) {
            None => Ok(None),
            Some(JsonValue::Number(n)) => Ok(n.as_f64()),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(index, "a number")),
            Some(_) => Err(self.invalid(index, "a number")),
        }
    }

    fn u64(&self, index: usize) -> Result<Option<u64>, RuleError> {
        match self.value(index) {
            None => Ok(None),
            Some(JsonValue::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(index, "a non-negative integer")),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(index, "a non-negative integer")),
            Some(_) => Err(self.invalid(index, "a non-negative integer")),
        }
    }

    fn u32(&self, index: usize) -> Result<Option<u32>, RuleError> {
        match self.u64(index)? {
            None => Ok(None),
            Some(n) => u32::try_from(n)
                .map(Some)
                .map_err(|_| self.invalid(index, "a small integer")),
        }
    }

    fn required_usize(&self, index: usize) -> Result<usize, RuleError> {
        self.u64(index)?
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| self.invalid(index, "a non-negative integer"))
    }

    fn list(&self, index: usize) -> Result<Option<&'a Vec<JsonValue>>, RuleError> {
        match self.value(index) {
            None => Ok(None),
            Some(JsonValue::Array(items)) => Ok(Some(items)),
            Some(_) => Err(self.invalid(index, "a list")),
        }
    }

    fn pattern(&self, index: usize) -> Result<Option<Pattern>, RuleError> {
        self.string(index)?
            .map(|source| Pattern::new(&source))
            .transpose()
    }

    fn card_selection(&self, index: usize) -> Result<CardSelection, RuleError> {
        let card = |name: &str| {
            CardType::from_name(name).ok_or_else(|| {
                RuleError::invalid_argument(self.rule, format!("unknown card type '{}'", name))
            })
        };
        match self.value(index) {
            None => Ok(CardSelection::Fast),
            Some(JsonValue::String(s)) => match s.to_lowercase().as_str() {
                "fast" => Ok(CardSelection::Fast),
                "all" => Ok(CardSelection::All),
                name => Ok(CardSelection::Only(vec![card(name)?])),
            },
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item.as_str() {
                    Some(name) => card(name),
                    None => Err(self.invalid(index, "a list of card type names")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(CardSelection::Only),
            Some(_) => Err(self.invalid(index, "'fast', 'all' or a list of card types")),
        }
    }

    fn date_options(&self) -> Result<DateOptions, RuleError> {
        let format = |key: &str| {
            DateFormat::from_key(key).ok_or_else(|| {
                RuleError::invalid_argument(self.rule, format!("unknown date format '{}'", key))
            })
        };
        let formats = match self.value(0) {
            None => vec![DateFormat::Ymd],
            Some(JsonValue::String(key)) => vec![format(key)?],
            Some(JsonValue::Array(keys)) => keys
                .iter()
                .map(|key| match key.as_str() {
                    Some(key) => format(key),
                    None => Err(self.invalid(0, "a list of date format keys")),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(self.invalid(0, "a date format key or a list of keys")),
        };
        Ok(DateOptions {
            formats,
            regex: self.pattern(1)?,
        })
    }

    fn locale_options(&self) -> Result<LocaleOptions, RuleError> {
        Ok(LocaleOptions {
            regex: self.pattern(0)?,
            country: self.string(1)?.map(|c| c.to_lowercase()),
        })
    }
}
