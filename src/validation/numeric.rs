//! Numbers, amounts, card numbers and selections.

use crate::validation::patterns::{Pattern, builtin};
use crate::validation::text::{loose_eq, scalar_text};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::LazyLock;

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?\s*$"));

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^[-+]?[0-9]*\.[0-9]+(?:[eE][-+]?[0-9]+)?$"));

static FAST_CARD: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|6011[0-9]{12}|3(?:0[0-5]|[68][0-9])[0-9]{11}|3[47][0-9]{13})$")
});

static CARD_PATTERNS: LazyLock<Vec<(CardType, Regex)>> = LazyLock::new(|| {
    CardType::ALL
        .iter()
        .map(|card| (*card, builtin(card.pattern())))
        .collect()
});

static CURRENCY_SYMBOL: LazyLock<Regex> = LazyLock::new(|| builtin(r"^\p{Sc}$"));

const CENT_SIGN: char = '\u{00a2}';

/// Whether `value` reads as a number: optional surrounding whitespace, sign,
/// decimal point and exponent.
pub fn numeric(value: &str) -> bool {
    NUMERIC.is_match(value)
}

pub(crate) fn parse_number(value: &str) -> Option<f64> {
    if numeric(value) {
        value.trim().parse().ok()
    } else {
        None
    }
}

/// A decimal with a mandatory point. With `places`, exactly that many digits
/// follow the point and no exponent is allowed.
pub fn decimal(value: &str, places: Option<u32>) -> bool {
    match places {
        None => DECIMAL.is_match(value),
        Some(places) => {
            let unsigned = value
                .strip_prefix(['-', '+'])
                .unwrap_or(value);
            let Some((int, frac)) = unsigned.split_once('.') else {
                return false;
            };
            int.chars().all(|c| c.is_ascii_digit())
                && frac.len() == places as usize
                && frac.chars().all(|c| c.is_ascii_digit())
        }
    }
}

/// With both bounds, `lower < value < upper`. Otherwise the value only has to
/// be a finite number.
pub fn range(value: &str, lower: Option<f64>, upper: Option<f64>) -> bool {
    let Some(number) = parse_number(value) else {
        return false;
    };
    match (lower, upper) {
        (Some(lower), Some(upper)) => number > lower && number < upper,
        _ => number.is_finite(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl CompareOp {
    /// Accepts symbols and words, ignoring case and all whitespace.
    pub fn parse(operator: &str) -> Option<Self> {
        let normalized: String = operator
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\0')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            ">" | "isgreater" => Some(Self::Greater),
            "<" | "isless" => Some(Self::Less),
            ">=" | "greaterorequal" => Some(Self::GreaterOrEqual),
            "<=" | "lessorequal" => Some(Self::LessOrEqual),
            "==" | "equalto" => Some(Self::Equal),
            "!=" | "notequal" => Some(Self::NotEqual),
            _ => None,
        }
    }
}

/// Numeric comparison when both sides are numeric, text comparison otherwise.
pub fn comparison(left: &str, op: CompareOp, right: &str) -> bool {
    use std::cmp::Ordering;

    let ordering = match (parse_number(left), parse_number(right)) {
        (Some(a), Some(b)) => match a.partial_cmp(&b) {
            Some(ordering) => ordering,
            None => return op == CompareOp::NotEqual,
        },
        _ => left.cmp(right),
    };
    match op {
        CompareOp::Greater => ordering == Ordering::Greater,
        CompareOp::Less => ordering == Ordering::Less,
        CompareOp::GreaterOrEqual => ordering != Ordering::Less,
        CompareOp::LessOrEqual => ordering != Ordering::Greater,
        CompareOp::Equal => ordering == Ordering::Equal,
        CompareOp::NotEqual => ordering != Ordering::Equal,
    }
}

/// Luhn checksum. Without `deep` this is a format-only pass and always true.
pub fn luhn(value: &str, deep: bool) -> bool {
    if !deep {
        return true;
    }
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if value.bytes().all(|b| b == b'0') {
        return false;
    }

    let sum: u32 = value
        .bytes()
        .rev()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .map(|(i, digit)| {
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Amex,
    Bankcard,
    Diners,
    Disc,
    Electron,
    Enroute,
    Jcb,
    Maestro,
    Mc,
    Solo,
    Switch,
    Visa,
    Voyager,
}

impl CardType {
    pub const ALL: [CardType; 13] = [
        Self::Amex,
        Self::Bankcard,
        Self::Diners,
        Self::Disc,
        Self::Electron,
        Self::Enroute,
        Self::Jcb,
        Self::Maestro,
        Self::Mc,
        Self::Solo,
        Self::Switch,
        Self::Visa,
        Self::Voyager,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|card| card.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Amex => "amex",
            Self::Bankcard => "bankcard",
            Self::Diners => "diners",
            Self::Disc => "disc",
            Self::Electron => "electron",
            Self::Enroute => "enroute",
            Self::Jcb => "jcb",
            Self::Maestro => "maestro",
            Self::Mc => "mc",
            Self::Solo => "solo",
            Self::Switch => "switch",
            Self::Visa => "visa",
            Self::Voyager => "voyager",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            Self::Amex => r"^3[47]\d{13}$",
            Self::Bankcard => r"^56(10\d\d|022[1-5])\d{10}$",
            Self::Diners => r"^(?:3(?:0[0-5]|[68]\d)\d{11}|5[1-5]\d{14})$",
            Self::Disc => r"^(?:6011|650\d)\d{12}$",
            Self::Electron => r"^(?:417500|4917\d{2}|4913\d{2})\d{10}$",
            Self::Enroute => r"^2(?:014|149)\d{11}$",
            Self::Jcb => r"^(3\d{4}|2100|1800)\d{11}$",
            Self::Maestro => r"^(?:5020|6\d{3})\d{12}$",
            Self::Mc => r"^5[1-5]\d{14}$",
            Self::Solo => r"^(6334[5-9][0-9]|6767[0-9]{2})\d{10}(\d{2,3})?$",
            Self::Switch => {
                r"^(?:49(03(0[2-9]|3[5-9])|11(0[1-2]|7[4-9]|8[1-2])|36[0-9]{2})\d{10}(\d{2,3})?|564182\d{10}(\d{2,3})?|6(3(33[0-4][0-9])|759[0-9]{2})\d{10}(\d{2,3})?)$"
            }
            Self::Visa => r"^4\d{12}(\d{3})?$",
            Self::Voyager => r"^8699[0-9]{11}$",
        }
    }

    fn matches(&self, number: &str) -> bool {
        CARD_PATTERNS
            .iter()
            .find(|(card, _)| card == self)
            .is_some_and(|(_, regex)| regex.is_match(number))
    }
}

/// Which card formats `cc` accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CardSelection {
    /// One generic pattern covering the major issuers.
    #[default]
    Fast,
    All,
    Only(Vec<CardType>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CcOptions {
    pub types: CardSelection,
    /// Run the Luhn checksum on a format match.
    pub deep: bool,
    /// Tried before the card table.
    pub regex: Option<Pattern>,
}

/// Credit card number. Dashes and spaces are ignored.
pub fn cc(value: &str, options: &CcOptions) -> bool {
    let number: String = value.chars().filter(|c| *c != '-' && *c != ' ').collect();
    if number.chars().count() < 13 {
        return false;
    }

    if let Some(regex) = &options.regex {
        if regex.is_match(&number) {
            return luhn(&number, options.deep);
        }
    }

    let matched = match &options.types {
        CardSelection::Fast => FAST_CARD.is_match(&number),
        CardSelection::All => CARD_PATTERNS.iter().any(|(_, regex)| regex.is_match(&number)),
        CardSelection::Only(cards) => cards.iter().any(|card| card.matches(&number)),
    };
    matched && luhn(&number, options.deep)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPosition {
    #[default]
    Left,
    Right,
}

/// A monetary amount with an optional currency symbol on one side.
///
/// Thousands grouping uses one of `, . space` consistently; the optional
/// two-digit fraction uses `,` or `.` and must differ from the grouping
/// separator. A leading zero may not be followed by a digit.
pub fn money(value: &str, position: SymbolPosition) -> bool {
    let amount = match position {
        SymbolPosition::Left => {
            let mut chars = value.chars();
            match chars.next() {
                Some(CENT_SIGN) => return false,
                Some(first) if is_currency_symbol(first) => chars.as_str(),
                _ => value,
            }
        }
        SymbolPosition::Right => match value.chars().next_back() {
            Some(CENT_SIGN) => return false,
            Some(last) if is_currency_symbol(last) => &value[..value.len() - last.len_utf8()],
            _ => value,
        },
    };
    money_amount(amount)
}

fn is_currency_symbol(c: char) -> bool {
    let mut buf = [0u8; 4];
    CURRENCY_SYMBOL.is_match(c.encode_utf8(&mut buf))
}

fn money_amount(amount: &str) -> bool {
    let bytes = amount.as_bytes();
    // "05" and "0,5" are rejected outright
    if bytes.first() == Some(&b'0') {
        let next = bytes.get(1).copied();
        let after_comma = bytes.get(2).copied();
        if next.is_some_and(|b| b.is_ascii_digit())
            || (next == Some(b',') && after_comma.is_some_and(|b| b.is_ascii_digit()))
        {
            return false;
        }
    }

    if integer_part(amount).is_some() {
        return true;
    }

    // a trailing separator plus two digits can only be the fraction
    if bytes.len() >= 4 {
        let split = bytes.len() - 3;
        let separator = bytes[split];
        let fraction = &bytes[split + 1..];
        if (separator == b',' || separator == b'.') && fraction.iter().all(u8::is_ascii_digit) {
            if let Some(grouping) = integer_part(&amount[..split]) {
                return grouping != Some(separator);
            }
        }
    }
    false
}

/// Validates the integer part and returns its grouping separator, if any.
fn integer_part(int: &str) -> Option<Option<u8>> {
    if int.is_empty() {
        return None;
    }
    if int.bytes().all(|b| b.is_ascii_digit()) {
        return Some(None);
    }

    let separator = int.bytes().find(|b| !b.is_ascii_digit())?;
    if !matches!(separator, b',' | b'.' | b' ') {
        return None;
    }
    let mut groups = int.split(separator as char);
    let head = groups.next()?;
    if head.is_empty() || head.len() > 3 || !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    Some(Some(separator))
}

/// Options for `multiple`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipleOptions {
    /// Allowed choices, compared loosely.
    #[serde(rename = "in", default)]
    pub choices: Option<Vec<JsonValue>>,
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
}

/// A selection of values. Falsy entries are dropped before counting.
pub fn multiple(value: &JsonValue, options: &MultipleOptions) -> bool {
    let selected: Vec<&JsonValue> = match value {
        JsonValue::Array(items) => items.iter().filter(|v| truthy(v)).collect(),
        other if truthy(other) => vec![other],
        _ => Vec::new(),
    };
    if selected.is_empty() {
        return false;
    }
    if options.max.is_some_and(|max| max > 0 && selected.len() > max) {
        return false;
    }
    if options.min.is_some_and(|min| min > 0 && selected.len() < min) {
        return false;
    }
    if let Some(choices) = &options.choices {
        return selected.iter().all(|item| {
            scalar_text(item).is_some_and(|text| {
                choices
                    .iter()
                    .filter_map(scalar_text)
                    .any(|choice| loose_eq(&text, &choice))
            })
        });
    }
    true
}

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty() && s != "0",
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}
