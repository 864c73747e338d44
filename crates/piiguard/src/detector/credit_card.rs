//! Built-in `credit_card` detector: candidate extraction plus the
//! mandatory Luhn check.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{annotate_builtin, Detector, DetectUtils, PatternComplexity};
use crate::types::{Hit, PiiType, Risk};

static CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9][0-9 -]{11,23}[0-9]").expect("credit card pattern compiles"));

/// 13-19 digits, optionally grouped by single spaces or hyphens, Luhn-valid,
/// bounded by non-digit characters.
pub struct CreditCardDetector;

impl Detector for CreditCardDetector {
    fn id(&self) -> &str {
        "credit_card"
    }

    fn detect(&self, utils: &mut DetectUtils<'_>) {
        let src = utils.src().to_string();
        for m in CANDIDATE_RE.find_iter(&src) {
            if !utils.can_push() {
                break;
            }
            let text = m.as_str();
            if !has_single_separators(text) {
                continue;
            }
            if !bounded_by_non_digit(&src, m.start(), m.end()) {
                continue;
            }
            let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() < 13 || digits.len() > 19 {
                continue;
            }
            if !luhn_valid(&digits) {
                continue;
            }
            let start_char = utils_char_offset(utils, m.start());
            let end_char = utils_char_offset(utils, m.end());
            let mut hit = Hit::new(PiiType::credit_card(), start_char, end_char, text, Risk::High);
            hit = hit.with_feature("digits", digits);
            hit = annotate_builtin(hit, PatternComplexity::High, true);
            utils.push(hit);
        }
    }
}

fn utils_char_offset(utils: &DetectUtils<'_>, byte_idx: usize) -> usize {
    utils.src()[..byte_idx].chars().count()
}

/// Rejects runs with two consecutive separator characters or with a
/// separator immediately at the boundary (e.g. trailing `-`).
fn has_single_separators(text: &str) -> bool {
    let bytes: Vec<char> = text.chars().collect();
    if bytes.first().map(|c| !c.is_ascii_digit()).unwrap_or(true) {
        return false;
    }
    if bytes.last().map(|c| !c.is_ascii_digit()).unwrap_or(true) {
        return false;
    }
    let mut prev_was_sep = false;
    for c in bytes {
        let is_sep = c == ' ' || c == '-';
        if is_sep && prev_was_sep {
            return false;
        }
        prev_was_sep = is_sep;
    }
    true
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

/// Standard mod-10 Luhn checksum over an all-digit string.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let mut d = (b - b'0') as u32;
            if i % 2 == 1 {
                d *= 2;
                if d > 9 {
                    d -= 9;
                }
            }
            d
        })
        .sum();
    sum % 10 == 0
}
