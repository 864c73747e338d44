//! Action dispatch and HMAC-based deterministic tokenization.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::policy::Rule;
use crate::types::{Action, Hit};

type HmacSha256 = Hmac<Sha256>;

/// A pure function from a hit to its replacement text. Maskers must be
/// side-effect-free and thread-safe, the same contract plugin detectors
/// follow.
pub type MaskerFn = Arc<dyn Fn(&Hit) -> String + Send + Sync>;

/// The default masker: `[REDACTED:<type>]`, `<type>` lowercase.
pub fn default_masker(hit: &Hit) -> String {
    format!("[REDACTED:{}]", hit.ty)
}

/// Keeps the last 4 digits of the matched value, replacing the rest with
/// `*` grouped in fours (credit-card style). Falls back to
/// [`default_masker`] when the value has fewer than 4 digits.
pub fn preserve_last4_masker(hit: &Hit) -> String {
    let digits: String = hit.value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return default_masker(hit);
    }
    let last4 = &digits[digits.len() - 4..];
    "**** **** **** ".to_string() + last4
}

/// Deterministically derive `TKN_<UPPER_TYPE>_<16-hex-chars>` from
/// `(hit.type, hit.value)` using HMAC-SHA256 keyed by `hmac_key`.
///
/// For a fixed key, the same `(type, value)` always yields the same token.
pub fn tokenize(hmac_key: &[u8], hit: &Hit) -> String {
    let mut mac =
        HmacSha256::new_from_slice(hmac_key).expect("HMAC accepts keys of any length");
    mac.update(hit.ty.as_str().as_bytes());
    mac.update(b":");
    mac.update(hit.value.as_bytes());
    let digest = mac.finalize().into_bytes();
    format!("TKN_{}_{}", hit.ty.to_uppercase(), hex::encode(&digest[..8]))
}

/// Emit the replacement text for a single hit per its resolved [`Rule`].
pub fn emit_replacement(hit: &Hit, rule: &Rule, masker: Option<&MaskerFn>, hmac_key: Option<&[u8]>) -> String {
    match rule.action {
        Action::Ignore => hit.value.clone(),
        Action::Remove => String::new(),
        Action::Mask => {
            if rule.preserve_last4 {
                preserve_last4_masker(hit)
            } else if let Some(m) = masker {
                m(hit)
            } else {
                default_masker(hit)
            }
        }
        Action::Tokenize => match hmac_key {
            Some(key) => tokenize(key, hit),
            // Policy::validate rejects this configuration at construction
            // time; fall back to masking rather than panicking if a caller
            // bypassed validation via a bare struct literal.
            None => default_masker(hit),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PiiType, Risk};

    fn sample_hit() -> Hit {
        Hit::new(PiiType::credit_card(), 0, 19, "4242-4242-4242-4242", Risk::High)
    }

    #[test]
    fn default_masker_format() {
        let hit = Hit::new(PiiType::email(), 0, 5, "a@b.co", Risk::Medium);
        assert_eq!(default_masker(&hit), "[REDACTED:email]");
    }

    #[test]
    fn preserve_last4_keeps_last_four_digits() {
        let hit = sample_hit();
        assert_eq!(preserve_last4_masker(&hit), "**** **** **** 4242");
    }

    #[test]
    fn preserve_last4_falls_back_with_too_few_digits() {
        let hit = Hit::new(PiiType::mac(), 0, 5, "ab", Risk::Medium);
        assert_eq!(preserve_last4_masker(&hit), "[REDACTED:mac]");
    }

    #[test]
    fn tokenize_is_deterministic_for_same_key() {
        let key = b"01234567890123456789012345678901";
        let hit = sample_hit();
        let a = tokenize(key, &hit);
        let b = tokenize(key, &hit);
        assert_eq!(a, b);
        assert!(a.starts_with("TKN_CREDIT_CARD_"));
        assert_eq!(a.len(), "TKN_CREDIT_CARD_".len() + 16);
    }

    #[test]
    fn tokenize_differs_across_keys() {
        let hit = sample_hit();
        let a = tokenize(b"01234567890123456789012345678901", &hit);
        let b = tokenize(b"abcdefabcdefabcdefabcdefabcdefab", &hit);
        assert_ne!(a, b);
    }

    #[test]
    fn emit_replacement_dispatches_by_action() {
        let hit = sample_hit();
        assert_eq!(
            emit_replacement(&hit, &Rule::new(Action::Ignore), None, None),
            hit.value
        );
        assert_eq!(
            emit_replacement(&hit, &Rule::new(Action::Remove), None, None),
            ""
        );
        assert_eq!(
            emit_replacement(&hit, &Rule::new(Action::Mask), None, None),
            "[REDACTED:credit_card]"
        );
    }
}
