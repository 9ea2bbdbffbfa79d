//! String checks: emptiness, character classes, lengths and list membership.

use crate::validation::patterns::{NOT_WHITESPACE, Pattern, builtin};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::sync::LazyLock;

static ALPHA_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^[\p{Ll}\p{Lm}\p{Lo}\p{Lt}\p{Lu}\p{Nd}]+$"));

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"(?i)^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
});

pub const DEFAULT_EXTENSIONS: &[&str] = &["gif", "jpeg", "png", "jpg"];

/// Text form of a scalar. Arrays and objects have none.
///
/// `null` is the empty string, booleans are `"1"` and `""`.
pub fn scalar_text(value: &JsonValue) -> Option<Cow<'_, str>> {
    match value {
        JsonValue::Null => Some(Cow::Borrowed("")),
        JsonValue::Bool(true) => Some(Cow::Borrowed("1")),
        JsonValue::Bool(false) => Some(Cow::Borrowed("")),
        JsonValue::Number(n) => Some(Cow::Owned(n.to_string())),
        JsonValue::String(s) => Some(Cow::Borrowed(s)),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Contains something other than whitespace. `"0"` passes.
pub fn not_empty(value: &str) -> bool {
    NOT_WHITESPACE.is_match(value)
}

/// Unicode letters and decimal digits only, at least one character.
pub fn alpha_numeric(value: &str) -> bool {
    ALPHA_NUMERIC.is_match(value)
}

/// Empty or whitespace only.
pub fn blank(value: &str) -> bool {
    !NOT_WHITESPACE.is_match(value)
}

/// Character length within `min..=max`.
pub fn between(value: &str, min: usize, max: usize) -> bool {
    let length = value.chars().count();
    length >= min && length <= max
}

pub fn min_length(value: &str, min: usize) -> bool {
    value.chars().count() >= min
}

pub fn max_length(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

pub fn custom(value: &str, pattern: &Pattern) -> bool {
    pattern.is_match(value)
}

/// The part after the last `.`, compared case-insensitively.
pub fn extension<S: AsRef<str>>(value: &str, extensions: &[S]) -> bool {
    let ext = value.rsplit('.').next().unwrap_or(value).to_lowercase();
    extensions
        .iter()
        .any(|allowed| allowed.as_ref().to_lowercase() == ext)
}

/// Loose membership: the text forms are compared.
pub fn in_list(value: &JsonValue, list: &[JsonValue]) -> bool {
    let Some(text) = scalar_text(value) else {
        return false;
    };
    list.iter()
        .filter_map(scalar_text)
        .any(|candidate| loose_eq(&text, &candidate))
}

/// `0`, `1`, `"0"`, `"1"`, `true` or `false`.
pub fn boolean(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(_) => true,
        JsonValue::Number(n) => matches!(n.as_u64(), Some(0 | 1)),
        JsonValue::String(s) => s == "0" || s == "1",
        _ => false,
    }
}

/// Strict equality: same type and same value.
pub fn equal_to(value: &JsonValue, expected: &JsonValue) -> bool {
    value == expected
}

pub fn uuid(value: &str) -> bool {
    UUID.is_match(value)
}

/// Equal as text, or equal as numbers when both sides are numeric.
pub(crate) fn loose_eq(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (
        crate::validation::numeric::parse_number(a),
        crate::validation::numeric::parse_number(b),
    ) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
