//! Normalization and context-window utilities.

use unicode_normalization::UnicodeNormalization;

/// Default context-window radius, in characters, either side of a point.
pub const CONTEXT_RADIUS: usize = 64;

/// Apply NFKC, then fold runs of whitespace (except newlines, which are
/// preserved) to a single space. Applied once at the top of `detect`/
/// `redact`; all hit offsets reference this normalized form.
///
/// Idempotent: `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(text: &str) -> String {
    let nfkc: String = text.nfkc().collect();
    fold_whitespace(&nfkc)
}

fn fold_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c == '\n' {
            out.push('\n');
            in_run = false;
        } else if c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Character count (not byte count) of `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn char_pos_to_byte(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

/// `context(p) = src[max(0,p-64) .. min(len,p+64)]`, lowercased.
pub fn context_window(s: &str, char_pos: usize, radius: usize) -> String {
    let total = char_len(s);
    let start = char_pos.saturating_sub(radius);
    let end = (char_pos + radius).min(total);
    let byte_start = char_pos_to_byte(s, start);
    let byte_end = char_pos_to_byte(s, end);
    s[byte_start..byte_end].to_lowercase()
}

/// The line of `s` containing character offset `char_pos`, used by the
/// allow/deny comment/documentation heuristic.
pub fn line_at(s: &str, char_pos: usize) -> &str {
    let byte_pos = char_pos_to_byte(s, char_pos);
    let start = s[..byte_pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = s[byte_pos..]
        .find('\n')
        .map(|i| byte_pos + i)
        .unwrap_or(s.len());
    &s[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_runs_of_whitespace_but_keeps_newlines() {
        let out = normalize("a   b\tc\n\nd");
        assert_eq!(out, "a b c\n\nd");
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = "full\u{3000}width\u{ff21}\u{ff22}   text";
        let once = normalize(input);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn nfkc_folds_fullwidth_digits_to_ascii() {
        let out = normalize("\u{ff11}\u{ff12}\u{ff13}");
        assert_eq!(out, "123");
    }

    #[test]
    fn context_window_is_bounded_and_lowercased() {
        let s = "AAAA SAMPLE BBBB";
        let win = context_window(s, 9, 4);
        assert!(win.contains("sample"));
    }

    #[test]
    fn line_at_returns_just_the_enclosing_line() {
        // A multi-byte character ahead of the target makes the byte offset
        // and char offset of "second@line.com" diverge, so this only
        // passes if `line_at` is actually exercising char->byte conversion.
        let s = "caf\u{e9} line\n// e.g. second@line.com\nthird";
        let byte_pos = s.find("second@line.com").unwrap();
        let char_pos = s[..byte_pos].chars().count();
        let line = line_at(s, char_pos);
        assert_eq!(line, "// e.g. second@line.com");
    }
}
