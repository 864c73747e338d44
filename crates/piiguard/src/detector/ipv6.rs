//! Built-in `ipv6` detector: a dedicated parser rather than a bare
//! regex, since hextet counting and `::` elision aren't regular.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{annotate_builtin, Detector, DetectUtils, PatternComplexity};
use crate::types::{Hit, PiiType, Risk};

static CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[0-9a-f:.]{2,45}").expect("ipv6 candidate pattern compiles"));

pub struct Ipv6Detector;

impl Detector for Ipv6Detector {
    fn id(&self) -> &str {
        "ipv6"
    }

    fn detect(&self, utils: &mut DetectUtils<'_>) {
        let src = utils.src().to_string();
        for m in CANDIDATE_RE.find_iter(&src) {
            if !utils.can_push() {
                break;
            }
            let text = m.as_str();
            if !text.contains(':') {
                continue;
            }
            // Longest valid prefix anchored at this start: garbage like
            // "2001::db8:::1" should still yield the shorter valid subspan
            // rather than nothing.
            let chars: Vec<char> = text.chars().collect();
            let mut best: Option<(usize, String)> = None;
            for len in (1..=chars.len()).rev() {
                let candidate: String = chars[..len].iter().collect();
                if let Some(canonical) = parse_ipv6(&candidate) {
                    best = Some((len, canonical));
                    break;
                }
            }
            let Some((char_len, canonical)) = best else {
                continue;
            };
            let byte_len: usize = chars[..char_len].iter().map(|c| c.len_utf8()).sum();
            let start_byte = m.start();
            let end_byte = m.start() + byte_len;
            let value = &src[start_byte..end_byte];
            let before_ok = src[..start_byte]
                .chars()
                .next_back()
                .map(|c| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(true);
            let after_ok = src[end_byte..]
                .chars()
                .next()
                .map(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
                .unwrap_or(true);
            if !before_ok || !after_ok {
                continue;
            }
            let start_char = src[..start_byte].chars().count();
            let end_char = start_char + char_len;
            let mut hit = Hit::new(PiiType::ipv6(), start_char, end_char, value, Risk::Low);
            hit = hit.with_feature("canonical", canonical);
            hit = annotate_builtin(hit, PatternComplexity::High, true);
            utils.push(hit);
        }
    }
}

/// Parse and validate an IPv6 literal, returning the zero-padded lowercase
/// canonical form on success.
///
/// Rejects more than one `::`, hextets longer than 4 hex digits, non-hex
/// characters, more than 7 explicit hextets when `::` is present (a
/// compressed form implies at least one elided group, so 8 explicit
/// hextets alongside `::` is contradictory), and anything but exactly 8
/// hextets when `::` is absent.
pub fn parse_ipv6(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    let compress_count = s.matches("::").count();
    if compress_count > 1 {
        return None;
    }

    if compress_count == 1 {
        let (left, right) = s.split_once("::").unwrap();
        let left_groups: Vec<&str> = if left.is_empty() {
            vec![]
        } else {
            left.split(':').collect()
        };
        let right_groups: Vec<&str> = if right.is_empty() {
            vec![]
        } else {
            right.split(':').collect()
        };
        if left_groups.iter().any(|g| g.is_empty()) || right_groups.iter().any(|g| g.is_empty()) {
            return None;
        }
        let left_hextets = expand_groups(&left_groups)?;
        let right_hextets = expand_groups(&right_groups)?;
        let total = left_hextets.len() + right_hextets.len();
        // A compressed form must still elide at least one group; accept any
        // explicit count up to 7 (loopback "::1" has just one).
        if total > 7 {
            return None;
        }
        let zeros = 8 - total;
        let mut all = left_hextets;
        all.extend(std::iter::repeat("0000".to_string()).take(zeros));
        all.extend(right_hextets);
        Some(all.join(":"))
    } else {
        let groups: Vec<&str> = s.split(':').collect();
        if groups.iter().any(|g| g.is_empty()) {
            return None;
        }
        let hextets = expand_groups(&groups)?;
        if hextets.len() != 8 {
            return None;
        }
        Some(hextets.join(":"))
    }
}

/// Expand a `:`-delimited group list into zero-padded hextet strings,
/// treating a trailing IPv4-mapped tail (`a.b.c.d`) as two hextets.
fn expand_groups(groups: &[&str]) -> Option<Vec<String>> {
    let mut out = Vec::with_capacity(groups.len() + 1);
    for (i, g) in groups.iter().enumerate() {
        let is_last = i == groups.len() - 1;
        if is_last && g.contains('.') {
            let (h1, h2) = parse_ipv4_tail(g)?;
            out.push(format!("{:04x}", h1));
            out.push(format!("{:04x}", h2));
        } else {
            if g.is_empty() || g.len() > 4 || !g.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let value = u16::from_str_radix(g, 16).ok()?;
            out.push(format!("{:04x}", value));
        }
    }
    Some(out)
}

fn parse_ipv4_tail(s: &str) -> Option<(u16, u16)> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut octets = [0u8; 4];
    for (i, p) in parts.iter().enumerate() {
        if p.is_empty() || p.len() > 3 || !p.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let v: u16 = p.parse().ok()?;
        if v > 255 {
            return None;
        }
        octets[i] = v as u8;
    }
    let h1 = ((octets[0] as u16) << 8) | octets[1] as u16;
    let h2 = ((octets[2] as u16) << 8) | octets[3] as u16;
    Some((h1, h2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Vec<Hit> {
        let mut utils = DetectUtils::new(src);
        Ipv6Detector.detect(&mut utils);
        utils.into_hits().0
    }

    #[test]
    fn parses_uncompressed_form() {
        let canonical = parse_ipv6("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(canonical, "2001:0db8:0000:0000:0000:0000:0000:0001");
    }

    #[test]
    fn parses_compressed_form() {
        let canonical = parse_ipv6("2001:db8::1").unwrap();
        assert_eq!(canonical, "2001:0db8:0000:0000:0000:0000:0000:0001");
    }

    #[test]
    fn parses_loopback_and_unspecified() {
        assert_eq!(parse_ipv6("::1").unwrap(), "0000:0000:0000:0000:0000:0000:0000:0001");
    }

    #[test]
    fn parses_ipv4_mapped() {
        let canonical = parse_ipv6("::ffff:192.0.2.1").unwrap();
        assert_eq!(canonical, "0000:0000:0000:0000:0000:ffff:c000:0201");
    }

    #[test]
    fn rejects_double_compression() {
        assert!(parse_ipv6("2001::db8::1").is_none());
    }

    #[test]
    fn rejects_overlong_hextet() {
        assert!(parse_ipv6("20011:db8::1").is_none());
    }

    #[test]
    fn detects_loopback_and_link_local_in_text() {
        let hits = run("Server ::1 and fe80::1");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].value, "::1");
        assert_eq!(hits[1].value, "fe80::1");
    }
}
