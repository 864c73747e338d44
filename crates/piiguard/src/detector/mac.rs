//! Built-in `mac` detector.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{boundary_ok, Detector, DetectUtils, PatternComplexity};
use crate::types::{PiiType, Risk};

static MAC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[0-9a-f]{2}[:-][0-9a-f]{2}[:-][0-9a-f]{2}[:-][0-9a-f]{2}[:-][0-9a-f]{2}[:-][0-9a-f]{2}")
        .expect("mac pattern compiles")
});

/// Six hex octets joined by a single, consistent separator (`:` or `-`).
/// Mixed separators within one candidate are rejected.
pub struct MacDetector;

impl Detector for MacDetector {
    fn id(&self) -> &str {
        "mac"
    }

    fn detect(&self, utils: &mut DetectUtils<'_>) {
        let src = utils.src().to_string();
        for m in MAC_RE.find_iter(&src) {
            if !utils.can_push() {
                break;
            }
            let text = m.as_str();
            if !uses_consistent_separator(text) {
                continue;
            }
            if !boundary_ok(&src, m.start(), m.end()) {
                continue;
            }
            utils.push_byte_span_scored(
                PiiType::mac(),
                Risk::Medium,
                m.start(),
                m.end(),
                PatternComplexity::Low,
                false,
            );
        }
    }
}

fn uses_consistent_separator(text: &str) -> bool {
    let seps: Vec<char> = text.chars().filter(|&c| c == ':' || c == '-').collect();
    seps.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Vec<crate::types::Hit> {
        let mut utils = DetectUtils::new(src);
        MacDetector.detect(&mut utils);
        utils.into_hits().0
    }

    #[test]
    fn matches_colon_separated_mac() {
        let hits = run("MAC 00:11:22:33:44:55 mixed 00-11:22-33");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "00:11:22:33:44:55");
    }

    #[test]
    fn matches_hyphen_separated_mac() {
        let hits = run("MAC 00-11-22-33-44-55 here");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "00-11-22-33-44-55");
    }

    #[test]
    fn rejects_mixed_separators_in_full_candidate() {
        let hits = run("00:11-22:33-44:55");
        assert!(hits.is_empty());
    }
}
