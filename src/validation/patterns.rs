//! Compiled patterns shared by the validators, and user-supplied overrides.
//!
//! Overrides use Rust `regex` syntax. A delimited form such as `/^[a-z]+$/i`
//! is also accepted; its trailing flags become inline flags.

use crate::error::RuleError;
use regex::Regex;
use std::sync::LazyLock;

/// Host part shared by `email` and `url`.
pub(crate) const HOSTNAME: &str = r"(?:[a-z0-9][-a-z0-9]*\.)*(?:[a-z0-9][-a-z0-9]{0,62})\.(?:(?:[a-z]{2}\.)?[a-z]{2,4}|museum|travel)";

pub(crate) const IPV4: &str = r"(?:(?:25[0-5]|2[0-4][0-9]|(?:(?:1[0-9])?|[1-9]?)[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|(?:(?:1[0-9])?|[1-9]?)[0-9])";

const DELIMITERS: &[char] = &['/', '#', '%', '~', '@', '!', '|'];

/// Build a regex from a pattern that is known to be valid.
///
/// Only used for the built-in tables; an invalid built-in is a programming
/// error caught by the unit tests.
pub(crate) fn builtin(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => panic!("invalid built-in pattern {pattern:?}: {e}"),
    }
}

pub(crate) static NOT_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| builtin(r"\S"));

/// A user-supplied override pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source`, accepting both plain and delimited syntax.
    pub fn new(source: &str) -> Result<Self, RuleError> {
        let translated = translate_delimited(source)?;
        let regex = Regex::new(&translated)
            .map_err(|e| RuleError::invalid_regex(source, e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// The pattern as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Turn `/body/flags` into `(?flags)body`. Anything else is returned as is.
fn translate_delimited(source: &str) -> Result<String, RuleError> {
    let Some(delimiter) = source.chars().next().filter(|c| DELIMITERS.contains(c)) else {
        return Ok(source.to_string());
    };
    let Some(end) = source.rfind(delimiter).filter(|&end| end > 0) else {
        return Ok(source.to_string());
    };

    let body = &source[delimiter.len_utf8()..end];
    let flags = &source[end + delimiter.len_utf8()..];

    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => {
                if !inline.contains(flag) {
                    inline.push(flag);
                }
            }
            // patterns are always Unicode-aware; `D` is the default for `$` here
            'u' | 'D' => {}
            other => {
                return Err(RuleError::invalid_regex(
                    source,
                    format!("unsupported pattern flag '{}'", other),
                ));
            }
        }
    }

    if inline.is_empty() {
        Ok(body.to_string())
    } else {
        Ok(format!("(?{}){}", inline, body))
    }
}
