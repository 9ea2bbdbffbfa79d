//! Email addresses, IP addresses and URLs.

use crate::validation::patterns::{HOSTNAME, IPV4, Pattern, builtin};
use regex::Regex;
use serde::{Deserialize, Serialize};
use hickory_resolver::Resolver;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use tracing::{debug, warn};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    builtin(&format!(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{{|}}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{{|}}~-]+)*@{HOSTNAME}$"
    ))
});

static EMAIL_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| builtin(&format!(r"(?i)@({HOSTNAME})$")));

const URL_CHARS: &str = r#"(?:[!"$&'()*+,\-.@_:;=~\[\]/0-9a-z\p{L}\p{N}]|%[0-9a-f]{2})"#;

static URL_STRICT: LazyLock<Regex> = LazyLock::new(|| builtin(&url_pattern(true)));
static URL_LOOSE: LazyLock<Regex> = LazyLock::new(|| builtin(&url_pattern(false)));

fn url_pattern(strict: bool) -> String {
    format!(
        r"(?i)^(?:(?:https?|ftps?|file|news|gopher)://){scheme}(?:{IPV4}|\[(?P<v6>[0-9a-f:.]+)\]|{HOSTNAME})(?::[1-9][0-9]{{0,4}})?(?:/?|/{URL_CHARS}*)?(?:\?{URL_CHARS}*)?(?:#{URL_CHARS}*)?$",
        scheme = if strict { "" } else { "?" },
    )
}

/// Decides whether a mail domain exists. Used by deep email checks only.
pub trait DomainResolver: Send + Sync {
    /// The domain publishes at least one MX record.
    fn has_mx(&self, domain: &str) -> bool;

    /// The domain has at least one A or AAAA record.
    fn has_address(&self, domain: &str) -> bool;

    /// MX first, any address record as the fallback.
    fn resolves(&self, domain: &str) -> bool {
        self.has_mx(domain) || self.has_address(domain)
    }
}

/// Resolves through the system DNS configuration. Blocking.
///
/// Lookups run on a short-lived thread of their own, so the resolver's
/// internal runtime never nests inside a caller's tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    fn run<R: Send>(task: impl FnOnce(&Resolver) -> R + Send) -> Option<R> {
        std::thread::scope(|scope| {
            scope
                .spawn(move || match Resolver::from_system_conf() {
                    Ok(resolver) => Some(task(&resolver)),
                    Err(e) => {
                        warn!(error = %e, "System DNS configuration unavailable");
                        None
                    }
                })
                .join()
                .ok()
                .flatten()
        })
    }

    fn mx(resolver: &Resolver, domain: &str) -> bool {
        match resolver.mx_lookup(fqdn(domain)) {
            Ok(lookup) => lookup.iter().next().is_some(),
            Err(e) => {
                debug!(domain = %domain, error = %e, "No MX record");
                false
            }
        }
    }

    fn address(resolver: &Resolver, domain: &str) -> bool {
        match resolver.lookup_ip(fqdn(domain)) {
            Ok(lookup) => lookup.iter().next().is_some(),
            Err(e) => {
                debug!(domain = %domain, error = %e, "No address record");
                false
            }
        }
    }
}

impl DomainResolver for SystemResolver {
    fn has_mx(&self, domain: &str) -> bool {
        Self::run(|resolver| Self::mx(resolver, domain)).unwrap_or(false)
    }

    fn has_address(&self, domain: &str) -> bool {
        Self::run(|resolver| Self::address(resolver, domain)).unwrap_or(false)
    }

    fn resolves(&self, domain: &str) -> bool {
        Self::run(|resolver| Self::mx(resolver, domain) || Self::address(resolver, domain))
            .unwrap_or(false)
    }
}

// absolute name, so search domains are not appended
fn fqdn(domain: &str) -> String {
    format!("{}.", domain.trim_end_matches('.'))
}

/// Email format. `regex` replaces the built-in pattern.
pub fn email(value: &str, regex: Option<&Pattern>) -> bool {
    match regex {
        Some(regex) => regex.is_match(value),
        None => EMAIL.is_match(value),
    }
}

/// Format check, then the domain must resolve.
pub fn email_deep(value: &str, regex: Option<&Pattern>, resolver: &dyn DomainResolver) -> bool {
    if !email(value, regex) {
        return false;
    }
    EMAIL_DOMAIN
        .captures(value)
        .and_then(|caps| caps.get(1))
        .is_some_and(|domain| resolver.resolves(domain.as_str()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
    #[default]
    Both,
}

impl IpVersion {
    /// `ipv4`, `ipv6` or `both`, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ipv4" | "v4" | "4" => Some(Self::V4),
            "ipv6" | "v6" | "6" => Some(Self::V6),
            "both" | "" => Some(Self::Both),
            _ => None,
        }
    }
}

pub fn ip(value: &str, version: IpVersion) -> bool {
    match version {
        IpVersion::V4 => value.parse::<Ipv4Addr>().is_ok(),
        IpVersion::V6 => value.parse::<Ipv6Addr>().is_ok(),
        IpVersion::Both => value.parse::<IpAddr>().is_ok(),
    }
}

/// URL with an optional scheme; `strict` makes the scheme mandatory.
pub fn url(value: &str, strict: bool) -> bool {
    let pattern = if strict { &URL_STRICT } else { &URL_LOOSE };
    let Some(caps) = pattern.captures(value) else {
        return false;
    };
    match caps.name("v6") {
        Some(v6) => v6.as_str().parse::<Ipv6Addr>().is_ok(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver {
        mx: &'static [&'static str],
        address: &'static [&'static str],
    }

    impl DomainResolver for FixedResolver {
        fn has_mx(&self, domain: &str) -> bool {
            self.mx.contains(&domain)
        }

        fn has_address(&self, domain: &str) -> bool {
            self.address.contains(&domain)
        }
    }

    #[test]
    fn test_email() {
        for ok in [
            "user@example.com",
            "first.last+tag@sub.example.co.uk",
            "USER@EXAMPLE.COM",
            "o'hara@example.museum",
        ] {
            assert!(email(ok, None), "{ok:?} should be an email");
        }
        for bad in ["not-an-email", "user@", "@example.com", "user@localhost", "a..b@example.com"] {
            assert!(!email(bad, None), "{bad:?} should not be an email");
        }
    }

    #[test]
    fn test_email_regex_override() {
        let pattern = Pattern::new(r"^[a-z]+@corp$").unwrap();
        assert!(email("joe@corp", Some(&pattern)));
        assert!(!email("joe@example.com", Some(&pattern)));
    }

    #[test]
    fn test_email_deep_uses_resolver() {
        let resolver = FixedResolver {
            mx: &["example.com"],
            address: &[],
        };
        assert!(email_deep("user@example.com", None, &resolver));
        assert!(!email_deep("user@missing.org", None, &resolver));
        assert!(!email_deep("user@", None, &resolver));
    }

    #[test]
    fn test_email_deep_mx_then_address_fallback() {
        let resolver = FixedResolver {
            mx: &["mail-only.example"],
            address: &["web-only.example"],
        };
        assert!(resolver.resolves("mail-only.example"));
        assert!(resolver.resolves("web-only.example"));
        assert!(!resolver.resolves("nothing.example"));
        assert!(email_deep("a@mail-only.example", None, &resolver));
        assert!(email_deep("a@web-only.example", None, &resolver));
        assert!(!email_deep("a@nothing.example", None, &resolver));
    }

    #[test]
    fn test_fqdn() {
        assert_eq!(fqdn("example.com"), "example.com.");
        assert_eq!(fqdn("example.com."), "example.com.");
    }

    #[test]
    fn test_ip() {
        assert!(ip("192.168.1.1", IpVersion::Both));
        assert!(ip("::1", IpVersion::Both));
        assert!(ip("192.168.1.1", IpVersion::V4));
        assert!(!ip("::1", IpVersion::V4));
        assert!(ip("2001:db8::ff00:42:8329", IpVersion::V6));
        assert!(!ip("10.0.0.1", IpVersion::V6));
        assert!(!ip("256.1.1.1", IpVersion::Both));
    }

    #[test]
    fn test_ip_version_names() {
        assert_eq!(IpVersion::from_name("IPv4"), Some(IpVersion::V4));
        assert_eq!(IpVersion::from_name("both"), Some(IpVersion::Both));
        assert_eq!(IpVersion::from_name("ipv5"), None);
    }

    #[test]
    fn test_url() {
        for ok in [
            "http://example.com",
            "https://www.example.com/path/to?x=1&y=2#frag",
            "ftp://192.168.0.1:21/file.txt",
            "http://[2001:db8::1]:8080/",
            "example.com/über",
            "https://example.com/%20space",
        ] {
            assert!(url(ok, false), "{ok:?} should be a url");
        }
        for bad in [
            "http://",
            "http://[zz::1]/",
            "mailto:user@example.com",
            "http://example.com:0",
            "http://exa mple.com",
        ] {
            assert!(!url(bad, false), "{bad:?} should not be a url");
        }
    }

    #[test]
    fn test_url_strict_requires_scheme() {
        assert!(url("example.com", false));
        assert!(!url("example.com", true));
        assert!(url("gopher://example.com", true));
    }
}
