//! Environment-aware allow/deny filtering.

use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

use crate::confidence::is_well_known_test_value;
use crate::policy::{AllowDenyConfig, Environment, Policy};
use crate::types::PiiType;

/// A single allow/deny rule, classified by shape: exact strings, domain
/// suffixes (leading `.`), email local-part prefixes (trailing `@`), or
/// CIDR-style IP prefixes.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    DomainSuffix(String),
    EmailPrefix(String),
    Cidr(IpNet),
}

impl Pattern {
    fn parse(raw: &str) -> Pattern {
        if let Some(suffix) = raw.strip_prefix('.') {
            return Pattern::DomainSuffix(suffix.to_lowercase());
        }
        if let Some(prefix) = raw.strip_suffix('@') {
            return Pattern::EmailPrefix(prefix.to_lowercase());
        }
        if let Ok(net) = IpNet::from_str(raw) {
            return Pattern::Cidr(net);
        }
        if let Ok(addr) = IpAddr::from_str(raw) {
            return Pattern::Cidr(IpNet::from(addr));
        }
        Pattern::Exact(raw.to_lowercase())
    }

    fn matches(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        match self {
            Pattern::Exact(s) => &lower == s,
            Pattern::DomainSuffix(suffix) => {
                let domain = lower.rsplit('@').next().unwrap_or(&lower);
                domain == *suffix || domain.ends_with(&format!(".{suffix}"))
            }
            Pattern::EmailPrefix(prefix) => lower.starts_with(&format!("{prefix}@")),
            Pattern::Cidr(net) => IpAddr::from_str(value)
                .map(|addr| net.contains(&addr))
                .unwrap_or(false),
        }
    }
}

fn parse_patterns(raw: &[String]) -> Vec<Pattern> {
    raw.iter().map(|s| Pattern::parse(s)).collect()
}

/// The compiled allow/deny manager for a registry.
pub struct AllowDenyManager {
    environment: Environment,
    allow_private_ips: bool,
    allow_test_patterns: bool,
    allowlist: HashMap<PiiType, Vec<Pattern>>,
    denylist: HashMap<PiiType, Vec<Pattern>>,
}

impl AllowDenyManager {
    pub fn new(environment: Environment, config: &AllowDenyConfig) -> Self {
        let mut allowlist = default_allowlist(environment);
        for (ty, patterns) in &config.custom_allowlist {
            allowlist
                .entry(ty.clone())
                .or_default()
                .extend(parse_patterns(patterns));
        }
        let mut denylist: HashMap<PiiType, Vec<Pattern>> = HashMap::new();
        for (ty, patterns) in &config.custom_denylist {
            denylist
                .entry(ty.clone())
                .or_default()
                .extend(parse_patterns(patterns));
        }
        Self {
            environment,
            allow_private_ips: config.allow_private_ips,
            allow_test_patterns: config.allow_test_patterns,
            allowlist,
            denylist,
        }
    }

    /// Decide whether `value` of `ty` should be exempted from detection.
    /// `line_context` is the line-local text surrounding the value, used
    /// for the comment/documentation heuristic.
    pub fn is_allowed(&self, ty: &PiiType, value: &str, line_context: &str) -> bool {
        if let Some(patterns) = self.denylist.get(ty) {
            if patterns.iter().any(|p| p.matches(value)) {
                return false;
            }
        }

        if is_comment_or_doc_context(line_context) {
            return true;
        }

        if let Some(patterns) = self.allowlist.get(ty) {
            if patterns.iter().any(|p| p.matches(value)) {
                return true;
            }
        }

        // Environment defaults that aren't expressible as simple
        // exact/suffix/CIDR patterns: fictional phone ranges,
        // repeated-digit phones, known test cards.
        if matches!(self.environment, Environment::Test | Environment::Development) {
            if ty == &PiiType::phone_e164()
                && (is_fictional_us_phone(value) || is_repeated_digit_phone(value))
            {
                return true;
            }
            if ty == &PiiType::credit_card() && is_well_known_test_value(value) {
                return true;
            }
        }

        if self.allow_private_ips && (ty == &PiiType::ipv4() || ty == &PiiType::ipv6()) {
            if is_private_ip(value) {
                return true;
            }
        }

        if self.allow_test_patterns {
            if ty == &PiiType::email() && value.to_lowercase().ends_with("@example.com") {
                return true;
            }
            if ty == &PiiType::credit_card() && is_well_known_test_value(value) {
                return true;
            }
            if ty == &PiiType::phone_e164() && is_repeated_digit_phone(value) {
                return true;
            }
        }

        false
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// True if `value` is force-kept by an explicit denylist entry,
    /// independent of the rest of the decision order in `is_allowed`.
    pub fn is_denylisted(&self, ty: &PiiType, value: &str) -> bool {
        self.denylist
            .get(ty)
            .map(|patterns| patterns.iter().any(|p| p.matches(value)))
            .unwrap_or(false)
    }
}

fn is_private_ip(value: &str) -> bool {
    let Ok(addr) = IpAddr::from_str(value) else {
        return false;
    };
    match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

fn is_repeated_digit_phone(value: &str) -> bool {
    let digits: Vec<char> = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 7 {
        return false;
    }
    digits.windows(2).all(|w| w[0] == w[1])
}

fn is_fictional_us_phone(value: &str) -> bool {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.contains("55501")
}

/// Line-local comment/documentation detection: `//`, `/* ... */`,
/// `#`, `<!-- -->`, JSDoc-style `*`, or phrasing like "e.g." / "for example"
/// / "placeholder" on the same line.
fn is_comment_or_doc_context(line: &str) -> bool {
    let lower = line.to_lowercase();
    const MARKERS: &[&str] = &[
        "//",
        "/*",
        "*/",
        "#",
        "<!--",
        "-->",
        "example:",
        "e.g.",
        "for example",
        "placeholder",
    ];
    MARKERS.iter().any(|m| lower.contains(m))
}

fn default_allowlist(environment: Environment) -> HashMap<PiiType, Vec<Pattern>> {
    let mut map: HashMap<PiiType, Vec<Pattern>> = HashMap::new();
    map.insert(
        PiiType::email(),
        vec![
            Pattern::EmailPrefix("noreply".to_string()),
            Pattern::EmailPrefix("no-reply".to_string()),
            Pattern::EmailPrefix("donotreply".to_string()),
            Pattern::EmailPrefix("do-not-reply".to_string()),
        ],
    );

    if matches!(environment, Environment::Production) {
        return map;
    }

    map.entry(PiiType::email()).or_default().extend(vec![
        Pattern::Exact("example.com".to_string()),
        Pattern::Exact("example.net".to_string()),
        Pattern::Exact("example.org".to_string()),
        Pattern::Exact("example.edu".to_string()),
        Pattern::DomainSuffix("example.com".to_string()),
        Pattern::DomainSuffix("example.net".to_string()),
        Pattern::DomainSuffix("example.org".to_string()),
        Pattern::DomainSuffix("example.edu".to_string()),
        Pattern::DomainSuffix("localhost".to_string()),
        Pattern::DomainSuffix("invalid".to_string()),
        Pattern::DomainSuffix("test".to_string()),
        Pattern::DomainSuffix("local".to_string()),
    ]);

    map.insert(
        PiiType::ipv4(),
        vec![
            Pattern::Exact("127.0.0.1".to_string()),
            Pattern::Cidr(IpNet::from_str("192.0.2.0/24").unwrap()),
            Pattern::Cidr(IpNet::from_str("198.51.100.0/24").unwrap()),
            Pattern::Cidr(IpNet::from_str("203.0.113.0/24").unwrap()),
        ],
    );

    map.insert(
        PiiType::ipv6(),
        vec![
            Pattern::Exact("::1".to_string()),
            Pattern::Cidr(IpNet::from_str("2001:db8::/32").unwrap()),
            Pattern::Cidr(IpNet::from_str("fe80::/10").unwrap()),
            Pattern::Cidr(IpNet::from_str("fc00::/7").unwrap()),
        ],
    );

    map
}
