//! Declarative per-field rule sets for model validation.

use crate::error::RuleError;
use serde_json::Value as JsonValue;

/// Restricts a rule to inserts or to updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOn {
    Create,
    Update,
}

impl RuleOn {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            _ => None,
        }
    }

    /// Whether the rule runs for a create (`true`) or an update pass.
    pub fn applies(&self, creating: bool) -> bool {
        match self {
            Self::Create => creating,
            Self::Update => !creating,
        }
    }
}

/// Failure message template, optionally with its own arguments.
///
/// Without arguments the template is filled from the rule's arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMessage {
    pub template: String,
    pub args: Option<Vec<JsonValue>>,
}

impl RuleMessage {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            args: None,
        }
    }

    pub fn with_args(template: impl Into<String>, args: Vec<JsonValue>) -> Self {
        Self {
            template: template.into(),
            args: Some(args),
        }
    }

    pub fn render(&self, rule_args: &[JsonValue]) -> String {
        format_message(&self.template, self.args.as_deref().unwrap_or(rule_args))
    }
}

/// One rule applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    /// Rule name. A leading `!` negates an engine rule.
    pub rule: String,
    pub args: Vec<JsonValue>,
    pub message: Option<RuleMessage>,
    /// `Some(true)` passes empty values without running the rule,
    /// `Some(false)` fails them.
    pub allow_empty: Option<bool>,
    /// Fail when the field is missing from the data.
    pub required: bool,
    /// Stop checking the field after this rule fails.
    pub last: bool,
    pub on: Option<RuleOn>,
}

impl FieldRule {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            args: Vec::new(),
            message: None,
            allow_empty: None,
            required: false,
            last: false,
            on: None,
        }
    }

    pub fn with_args(mut self, args: Vec<JsonValue>) -> Self {
        self.args = args;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(RuleMessage::new(message));
        self
    }

    pub fn with_message_args(mut self, template: impl Into<String>, args: Vec<JsonValue>) -> Self {
        self.message = Some(RuleMessage::with_args(template, args));
        self
    }

    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = Some(allow);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn last(mut self) -> Self {
        self.last = true;
        self
    }

    pub fn on(mut self, on: RuleOn) -> Self {
        self.on = Some(on);
        self
    }

    /// `(negated, name)` with the `!` prefix stripped.
    pub fn split_negation(&self) -> (bool, &str) {
        match self.rule.strip_prefix('!') {
            Some(name) => (true, name.trim()),
            None => (false, self.rule.trim()),
        }
    }

    /// Message for a failure of this rule. Falls back to the rule name.
    pub fn failure_message(&self) -> String {
        match &self.message {
            Some(message) => message.render(&self.args),
            None => self.rule.clone(),
        }
    }

    /// Parse one rule description.
    ///
    /// A bare string names the rule. An object carries `rule` (a name or a
    /// `[name, args..]` array), and optionally `message` (a template or a
    /// `[template, args..]` array), `allowEmpty`, `required`, `last` and `on`.
    pub fn from_json(value: &JsonValue) -> Result<Self, RuleError> {
        let map = match value {
            JsonValue::String(name) => return Ok(Self::new(name.as_str())),
            JsonValue::Object(map) => map,
            other => {
                return Err(RuleError::invalid_argument(
                    "rule set",
                    format!("expected a rule name or object, got {other}"),
                ));
            }
        };

        let mut rule = match map.get("rule") {
            Some(JsonValue::String(name)) => Self::new(name.as_str()),
            Some(JsonValue::Array(items)) => match items.split_first() {
                Some((JsonValue::String(name), args)) => Self::new(name.as_str()).with_args(args.to_vec()),
                _ => {
                    return Err(RuleError::invalid_argument(
                        "rule set",
                        "a rule array must start with the rule name",
                    ));
                }
            },
            _ => return Err(RuleError::invalid_argument("rule set", "missing 'rule'")),
        };

        rule.message = match map.get("message") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(template)) => Some(RuleMessage::new(template.as_str())),
            Some(JsonValue::Array(items)) => match items.split_first() {
                Some((JsonValue::String(template), args)) => {
                    Some(RuleMessage::with_args(template.as_str(), args.to_vec()))
                }
                _ => {
                    return Err(RuleError::invalid_argument(
                        &rule.rule,
                        "a message array must start with the template",
                    ));
                }
            },
            Some(other) => {
                return Err(RuleError::invalid_argument(
                    &rule.rule,
                    format!("invalid message {other}"),
                ));
            }
        };

        rule.allow_empty = map.get("allowEmpty").and_then(JsonValue::as_bool);
        rule.required = flag(map.get("required"));
        rule.last = flag(map.get("last"));
        rule.on = match map.get("on") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(on)) => Some(RuleOn::from_name(on).ok_or_else(|| {
                RuleError::invalid_argument(&rule.rule, format!("unknown 'on' value '{on}'"))
            })?),
            Some(other) => {
                return Err(RuleError::invalid_argument(
                    &rule.rule,
                    format!("invalid 'on' value {other}"),
                ));
            }
        };
        Ok(rule)
    }
}

fn flag(value: Option<&JsonValue>) -> bool {
    value.and_then(JsonValue::as_bool).unwrap_or(false)
}

/// Field → rules, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRules {
    fields: Vec<(String, Vec<FieldRule>)>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `rule` to the rules of `field`.
    pub fn add(&mut self, field: &str, rule: FieldRule) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, rules)) => rules.push(rule),
            None => self.fields.push((field.to_string(), vec![rule])),
        }
    }

    pub fn field(mut self, field: &str, rule: FieldRule) -> Self {
        self.add(field, rule);
        self
    }

    pub fn get(&self, field: &str) -> Option<&[FieldRule]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, rules)| rules.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FieldRule])> {
        self.fields.iter().map(|(name, rules)| (name.as_str(), rules.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse `{ field: ruleSet }` where a rule set is one rule description
    /// or an array of them.
    pub fn from_json(value: &JsonValue) -> Result<Self, RuleError> {
        let map = value
            .as_object()
            .ok_or_else(|| RuleError::invalid_argument("rule set", "expected an object of fields"))?;
        let mut rules = Self::new();
        for (field, set) in map {
            match set {
                JsonValue::Array(items) => {
                    for item in items {
                        rules.add(field, FieldRule::from_json(item)?);
                    }
                }
                single => rules.add(field, FieldRule::from_json(single)?),
            }
        }
        Ok(rules)
    }
}

/// Fill `%s` and `%d` placeholders from `args` in order. `%%` is a literal
/// percent sign. Missing arguments render as empty text (or `0` for `%d`).
pub fn format_message(template: &str, args: &[JsonValue]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') => {
                chars.next();
                if let Some(arg) = args.next() {
                    out.push_str(&as_text(arg));
                }
            }
            Some('d') => {
                chars.next();
                out.push_str(&args.next().map(as_integer).unwrap_or(0).to_string());
            }
            _ => out.push('%'),
        }
    }
    out
}

fn as_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        JsonValue::Bool(true) => "1".to_string(),
        JsonValue::Bool(false) => String::new(),
        other => other.to_string(),
    }
}

fn as_integer(value: &JsonValue) -> i64 {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        JsonValue::Bool(b) => i64::from(*b),
        _ => 0,
    }
}
