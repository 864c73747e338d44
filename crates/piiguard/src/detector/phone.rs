//! Built-in `phone_e164` detector.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Detector, DetectUtils, PatternComplexity};
use crate::types::{PiiType, Risk};

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+[0-9]{8,15}").expect("phone pattern compiles"));

/// `+` followed by 8-15 digits, bounded by non-digit characters. No region
/// logic; region-specific formats are a plugin's responsibility.
pub struct PhoneDetector;

impl Detector for PhoneDetector {
    fn id(&self) -> &str {
        "phone_e164"
    }

    fn detect(&self, utils: &mut DetectUtils<'_>) {
        let src = utils.src().to_string();
        for m in PHONE_RE.find_iter(&src) {
            if !utils.can_push() {
                break;
            }
            if !bounded_by_non_digit(&src, m.start(), m.end()) {
                continue;
            }
            utils.push_byte_span_scored(
                PiiType::phone_e164(),
                Risk::Medium,
                m.start(),
                m.end(),
                PatternComplexity::Low,
                false,
            );
        }
    }
}

fn bounded_by_non_digit(src: &str, start: usize, end: usize) -> bool {
    let before_ok = src[..start]
        .chars()
        .next_back()
        .map(|c| !c.is_ascii_digit())
        .unwrap_or(true);
    let after_ok = src[end..]
        .chars()
        .next()
        .map(|c| !c.is_ascii_digit())
        .unwrap_or(true);
    before_ok && after_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Vec<crate::types::Hit> {
        let mut utils = DetectUtils::new(src);
        PhoneDetector.detect(&mut utils);
        utils.into_hits().0
    }

    #[test]
    fn matches_e164_number() {
        let hits = run("Call +14155552671 now");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "+14155552671");
    }

    #[test]
    fn rejects_too_short_digit_run() {
        let hits = run("Code +1234 invalid");
        assert!(hits.is_empty());
    }

    #[test]
    fn rejects_when_preceded_by_digit() {
        let hits = run("1+14155552671");
        assert!(hits.is_empty());
    }
}
