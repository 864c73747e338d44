//! Built-in `ipv4` detector.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{boundary_ok, Detector, DetectUtils, PatternComplexity};
use crate::types::{PiiType, Risk};

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])(\.(25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])){3}")
        .expect("ipv4 pattern compiles")
});

/// Four dotted decimal octets, bounded by non-alphanumeric characters.
pub struct Ipv4Detector;

impl Detector for Ipv4Detector {
    fn id(&self) -> &str {
        "ipv4"
    }

    fn detect(&self, utils: &mut DetectUtils<'_>) {
        let src = utils.src().to_string();
        for m in IPV4_RE.find_iter(&src) {
            if !utils.can_push() {
                break;
            }
            if !boundary_ok(&src, m.start(), m.end()) {
                continue;
            }
            utils.push_byte_span_scored(
                PiiType::ipv4(),
                Risk::Low,
                m.start(),
                m.end(),
                PatternComplexity::Medium,
                false,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Vec<crate::types::Hit> {
        let mut utils = DetectUtils::new(src);
        Ipv4Detector.detect(&mut utils);
        utils.into_hits().0
    }

    #[test]
    fn matches_plain_ipv4() {
        let hits = run("Server at 192.168.1.10 is up");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "192.168.1.10");
    }

    #[test]
    fn rejects_out_of_range_octets() {
        let hits = run("Bad: 999.1.1.1");
        assert!(hits.is_empty());
    }

    #[test]
    fn rejects_when_part_of_longer_alphanumeric_token() {
        let hits = run("x192.168.1.1x");
        assert!(hits.is_empty());
    }
}
