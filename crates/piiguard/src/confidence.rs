//! Confidence scoring and validation-strictness gating.

use crate::detector::PatternComplexity;
use crate::policy::ValidationStrictness;
use crate::types::Hit;

/// Per-hit signals used by scoring and strictness gating.
#[derive(Debug, Clone, Copy, Default)]
pub struct Features {
    pub pattern_complexity: Option<PatternComplexity>,
    pub is_complete_match: bool,
    pub has_word_boundaries: bool,
    pub contains_valid_checksum: bool,
    pub context_hint_nearby: bool,
    pub in_test_context: bool,
}

/// Read back the features a detector recorded directly on the hit's
/// `features` map (built-ins populate this via `detector::annotate_builtin`),
/// combined with the context/test-context signals the registry computes
/// centrally.
pub fn features_from_hit(hit: &Hit, context_hint_nearby: bool, in_test_context: bool) -> Features {
    let complexity = match hit.features.get("pattern_complexity") {
        Some(crate::types::FeatureValue::Text(s)) => match s.as_str() {
            "low" => Some(PatternComplexity::Low),
            "high" => Some(PatternComplexity::High),
            _ => Some(PatternComplexity::Medium),
        },
        _ => None,
    };
    Features {
        pattern_complexity: complexity,
        is_complete_match: hit.feature_bool("is_complete_match"),
        has_word_boundaries: hit.feature_bool("has_word_boundaries"),
        contains_valid_checksum: hit.feature_bool("contains_valid_checksum"),
        context_hint_nearby,
        in_test_context,
    }
}

/// Score a hit. Start at 0.5; detector complexity,
/// complete-match, word-boundary, checksum, and context-hint signals add;
/// test-context subtracts unless the allow/deny manager has already force-
/// denied the value (in which case the caller should not call this with
/// `in_test_context` set). Clamped to `[0, 1]`.
pub fn score(features: &Features) -> f32 {
    let mut s = 0.5;
    if let Some(c) = features.pattern_complexity {
        s += c.weight();
    }
    if features.is_complete_match {
        s += 0.1;
    }
    if features.has_word_boundaries {
        s += 0.1;
    }
    if features.contains_valid_checksum {
        s += 0.2;
    }
    if features.context_hint_nearby {
        s += 0.05;
    }
    if features.in_test_context {
        s -= 0.3;
    }
    s.clamp(0.0, 1.0)
}

/// Well-known test-corpus card numbers and documentation constants that
/// `strict` validation rejects outright regardless of confidence.
pub fn is_well_known_test_value(value: &str) -> bool {
    const TEST_CARDS: &[&str] = &[
        "4242424242424242",
        "4000056655665556",
        "5555555555554444",
        "378282246310005",
    ];
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if TEST_CARDS.contains(&digits.as_str()) {
        return true;
    }
    let lower = value.to_lowercase();
    matches!(
        lower.as_str(),
        "example.com" | "example.org" | "example.net" | "localhost" | "2001:db8::"
    )
}

/// Strictness gate applied in addition to the numeric threshold.
pub fn passes_strictness(
    strictness: ValidationStrictness,
    features: &Features,
    hit: &Hit,
    denied: bool,
) -> bool {
    match strictness {
        ValidationStrictness::Fast => true,
        ValidationStrictness::Balanced => true,
        ValidationStrictness::Strict => {
            if !denied && is_well_known_test_value(&hit.value) {
                return false;
            }
            features.context_hint_nearby || features.has_word_boundaries
        }
    }
}
