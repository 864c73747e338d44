//! Built-in `email` detector.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{boundary_ok, Detector, DetectUtils, PatternComplexity};
use crate::types::{PiiType, Risk};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]+\.[A-Za-z]{2,63}")
        .expect("email pattern compiles")
});

/// `local-part@domain.tld`, case-insensitive, bounded by non-identifier
/// characters on both sides.
pub struct EmailDetector;

impl Detector for EmailDetector {
    fn id(&self) -> &str {
        "email"
    }

    fn detect(&self, utils: &mut DetectUtils<'_>) {
        let src = utils.src().to_string();
        for m in EMAIL_RE.find_iter(&src) {
            if !utils.can_push() {
                break;
            }
            let domain = &m.as_str()[m.as_str().find('@').unwrap() + 1..];
            if domain.len() > 253 {
                continue;
            }
            if !boundary_ok(&src, m.start(), m.end()) {
                continue;
            }
            utils.push_byte_span_scored(
                PiiType::email(),
                Risk::Medium,
                m.start(),
                m.end(),
                PatternComplexity::Medium,
                false,
            );
        }
    }
}
