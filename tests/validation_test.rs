//! Integration tests for the validation engine.
//!
//! Tests verify that:
//! - Rules built from names and JSON behave like the typed rules
//! - Deep checks go through the injected resolver
//! - Misconfiguration fails closed in `check` and surfaces in `try_check`
//! - Luhn agrees with an independent checksum on random card numbers

use modelgate::error::RuleError;
use modelgate::validation::{
    CountryRegistry, CountryRules, DomainResolver, LocaleOptions, Rule, Validator,
};
use rand::Rng;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

struct NoDns;

impl DomainResolver for NoDns {
    fn has_mx(&self, _domain: &str) -> bool {
        false
    }

    fn has_address(&self, _domain: &str) -> bool {
        false
    }
}

/// `example.com` has mail exchangers, `web.test` only an address record.
struct KnownDomains;

impl DomainResolver for KnownDomains {
    fn has_mx(&self, domain: &str) -> bool {
        domain == "example.com"
    }

    fn has_address(&self, domain: &str) -> bool {
        domain == "web.test"
    }
}

fn validator() -> Validator {
    Validator::new().with_resolver(Arc::new(NoDns))
}

fn named(name: &str, args: &[JsonValue], value: JsonValue) -> bool {
    validator().check_named(name, args, &value)
}

#[test]
fn test_luhn_examples() {
    assert!(named("luhn", &[json!(true)], json!("4012888888881881")));
    assert!(!named("luhn", &[json!(true)], json!("4012888888881882")));
    // format-only mode
    assert!(named("luhn", &[], json!("4012888888881882")));
}

fn reference_luhn(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[test]
fn test_luhn_matches_reference_checksum() {
    let mut rng = rand::thread_rng();
    let mut v = validator();
    let rule = Rule::Luhn { deep: true };

    for _ in 0..500 {
        let len = rng.gen_range(13..=19);
        let mut digits: Vec<u32> = (0..len).map(|_| rng.gen_range(0..10)).collect();
        digits[0] = rng.gen_range(1..10);
        let number: String = digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect();

        assert_eq!(
            v.check(&rule, &json!(number)),
            reference_luhn(&digits),
            "luhn disagreed for {number}"
        );
    }
}

#[test]
fn test_between_counts_characters() {
    assert!(named("between", &[json!(1), json!(10)], json!("hello")));
    assert!(!named("between", &[json!(6), json!(10)], json!("hello")));
    assert!(named("between", &[json!(5), json!(5)], json!("héllo")));
    assert!(named("between", &[json!(2), json!(2)], json!("日本")));
}

#[test]
fn test_email_with_and_without_lookup() {
    assert!(named("email", &[], json!("user@example.com")));
    assert!(!named("email", &[], json!("not-an-email")));
    assert!(!named("email", &[json!(true)], json!("user@")));

    let mut v = Validator::new().with_resolver(Arc::new(KnownDomains));
    let deep = Rule::from_json(&json!({"rule": "email", "deep": true})).unwrap();
    assert!(v.check(&deep, &json!("user@example.com")));
    assert!(v.check(&deep, &json!("user@web.test")));
    assert!(!v.check(&deep, &json!("user@unknown.test")));
}

#[test]
fn test_leap_years() {
    assert!(named("date", &[json!("dmy")], json!("29/02/2000")));
    assert!(!named("date", &[json!("dmy")], json!("29/02/1900")));
    assert!(named("date", &[json!("ymd")], json!("2024-02-29")));
    assert!(!named("date", &[json!("ymd")], json!("2023-02-29")));
}

#[test]
fn test_range() {
    assert!(named("range", &[json!(1), json!(10)], json!(5)));
    assert!(!named("range", &[json!(1), json!(10)], json!(15)));
    assert!(!named("range", &[json!(1), json!(10)], json!(10)));
    assert!(named("range", &[], json!(5)));
    assert!(!named("range", &[], json!("abc")));
}

#[test]
fn test_rule_from_json_forms() {
    let mut v = validator();

    let postal = Rule::from_json(&json!({"rule": "postal", "country": "UK"})).unwrap();
    assert!(v.check(&postal, &json!("SW1A 1AA")));

    let cc = Rule::from_json(&json!(["cc", ["visa"], true])).unwrap();
    assert!(v.check(&cc, &json!("4111 1111 1111 1111")));
    assert!(!v.check(&cc, &json!("5500 0000 0000 0004")));

    let custom = Rule::from_json(&json!({"rule": "custom", "regex": "/^abc$/i"})).unwrap();
    assert!(v.check(&custom, &json!("ABC")));

    assert_eq!(
        Rule::from_json(&json!("nope")),
        Err(RuleError::unknown_rule("nope"))
    );
}

#[test]
fn test_comparison_and_lists() {
    assert!(named("comparison", &[json!("is greater"), json!(3)], json!("10")));
    assert!(!named("comparison", &[json!("<="), json!(3)], json!(10)));
    assert!(named("comparison", &[json!("=="), json!("abc")], json!("abc")));
    assert!(named("inList", &[json!(["1", "2"])], json!(2)));
    assert!(!named("inList", &[json!(["1", "2"])], json!(3)));
    assert!(named(
        "multiple",
        &[json!({"in": ["a", "b", "c"], "max": 2})],
        json!(["a", "", "c"])
    ));
    assert!(!named("multiple", &[json!({"in": ["a"]})], json!(["a", "z"])));
}

#[test]
fn test_misconfiguration_fails_closed() {
    let mut v = validator();

    assert!(!v.check_named("noSuchRule", &[], &json!("x")));
    assert!(!v.check_named("comparison", &[json!("~"), json!(1)], &json!(1)));
    assert!(!v.check(&Rule::Ssn(LocaleOptions::default()), &json!("123-45-6789")));
    assert_eq!(v.diagnostics().warnings().count(), 3);

    let err = v
        .try_check(&Rule::Phone(LocaleOptions::country("jp")), &json!("03-1234-5678"))
        .unwrap_err();
    assert_eq!(err, RuleError::unsupported_country("phone", "jp"));
}

struct Japan;

impl CountryRules for Japan {
    fn phone(&self, value: &str) -> Option<bool> {
        Some(value.starts_with('0') && value.chars().filter(char::is_ascii_digit).count() == 10)
    }
}

#[test]
fn test_country_registry_delegation() {
    let mut v = validator().with_countries(CountryRegistry::new().with("jp", Japan));

    let phone = Rule::Phone(LocaleOptions::country("JP"));
    assert!(v.check(&phone, &json!("03-1234-5678")));
    assert!(!v.check(&phone, &json!("3-1234-5678")));

    assert_eq!(
        v.try_check(&Rule::Postal(LocaleOptions::country("jp")), &json!("100-0001")),
        Err(RuleError::missing_country_rule("postal", "jp"))
    );
}

#[test]
fn test_diagnostics_are_per_validator() {
    let mut first = validator();
    let second = validator();

    first.check(&Rule::Numeric, &json!("12"));
    first.check(&Rule::Numeric, &json!("twelve"));

    assert_eq!(first.diagnostics().len(), 2);
    assert!(first.diagnostics().last().unwrap().failed);
    assert!(second.diagnostics().is_empty());
}
