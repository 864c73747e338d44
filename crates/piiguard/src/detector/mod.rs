//! Detector contract and the execution harness detectors run
//! under.

use std::collections::HashSet;

use crate::types::{Hit, PiiType, Risk};

pub mod credit_card;
pub mod email;
pub mod ipv4;
pub mod ipv6;
pub mod mac;
pub mod phone;

/// Default per-call cap on pushed hits.
pub const DEFAULT_HIT_CAP: usize = 10_000;

/// Default context-window radius in characters.
pub const CONTEXT_WINDOW: usize = 64;

/// A pluggable unit that produces candidate [`Hit`]s from normalized text.
///
/// Implementations must be idempotent and side-effect-free: `detect` is
/// called once per registry call, in priority order, and must not mutate
/// any state outside the [`DetectUtils`] handle it is given.
///
/// (Named `detect` rather than `match`, which is a reserved word.)
pub trait Detector: Send + Sync {
    /// Unique identifier within a registry.
    fn id(&self) -> &str;

    /// Lower runs earlier and wins priority ties in arbitration.
    /// Default 0, matching built-ins.
    fn priority(&self) -> i32 {
        0
    }

    fn detect(&self, utils: &mut DetectUtils<'_>);
}

/// The handle detectors read text through and push candidate hits into.
///
/// Owns the char/byte offset table so built-in detectors, which match with
/// byte-oriented `regex`, can report char offsets without re-walking the
/// string themselves.
pub struct DetectUtils<'a> {
    src: &'a str,
    char_byte_offsets: Vec<usize>,
    hits: Vec<Hit>,
    cap: usize,
    rejected: usize,
    last_push_char_pos: Option<usize>,
}

impl<'a> DetectUtils<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::with_cap(src, DEFAULT_HIT_CAP)
    }

    pub fn with_cap(src: &'a str, cap: usize) -> Self {
        let mut char_byte_offsets = Vec::with_capacity(src.len() + 1);
        for (byte_idx, _) in src.char_indices() {
            char_byte_offsets.push(byte_idx);
        }
        char_byte_offsets.push(src.len());
        Self {
            src,
            char_byte_offsets,
            hits: Vec::new(),
            cap,
            rejected: 0,
            last_push_char_pos: None,
        }
    }

    /// The normalized text detectors match against.
    pub fn src(&self) -> &str {
        self.src
    }

    /// Total character count of `src`.
    pub fn char_len(&self) -> usize {
        self.char_byte_offsets.len().saturating_sub(1)
    }

    pub fn can_push(&self) -> bool {
        self.hits.len() < self.cap
    }

    fn char_to_byte(&self, char_idx: usize) -> usize {
        self.char_byte_offsets[char_idx.min(self.char_byte_offsets.len() - 1)]
    }

    /// Append a fully-constructed candidate hit. Bounds-checked against the
    /// per-call cap; rejected pushes increment a counter but never error.
    pub fn push(&mut self, hit: Hit) -> bool {
        if !self.can_push() {
            self.rejected += 1;
            return false;
        }
        self.last_push_char_pos = Some(hit.start);
        self.hits.push(hit);
        true
    }

    /// Convenience for detectors matching with byte-indexed `regex`: builds
    /// a `Hit` spanning `[byte_start, byte_end)` of `src`, translating to
    /// char offsets, and pushes it.
    pub fn push_byte_span(
        &mut self,
        ty: PiiType,
        risk: Risk,
        byte_start: usize,
        byte_end: usize,
    ) -> bool {
        let start = self.byte_to_char_count(byte_start);
        let end = self.byte_to_char_count(byte_end);
        let value = self.src[byte_start..byte_end].to_string();
        self.push(Hit::new(ty, start, end, value, risk))
    }

    fn byte_to_char_count(&self, byte_idx: usize) -> usize {
        self.src[..byte_idx].chars().count()
    }

    /// Like [`Self::push_byte_span`], additionally recording the
    /// features every built-in detector shares: declared pattern
    /// complexity, and that boundary/checksum validation already passed
    /// (built-ins only call this after `boundary_ok`/Luhn/parse succeed).
    pub fn push_byte_span_scored(
        &mut self,
        ty: PiiType,
        risk: Risk,
        byte_start: usize,
        byte_end: usize,
        complexity: PatternComplexity,
        checksum_valid: bool,
    ) -> bool {
        let start = self.byte_to_char_count(byte_start);
        let end = self.byte_to_char_count(byte_end);
        let value = self.src[byte_start..byte_end].to_string();
        let hit = annotate_builtin(
            Hit::new(ty, start, end, value, risk),
            complexity,
            checksum_valid,
        );
        self.push(hit)
    }

    /// True if any of `keywords` occurs (case-insensitively) within
    /// `±CONTEXT_WINDOW` characters of the most recently pushed hit.
    pub fn has_context(&self, keywords: &[&str]) -> bool {
        let Some(pos) = self.last_push_char_pos else {
            return false;
        };
        let total = self.char_len();
        let window_start = pos.saturating_sub(CONTEXT_WINDOW);
        let window_end = (pos + CONTEXT_WINDOW).min(total);
        let byte_start = self.char_to_byte(window_start);
        let byte_end = self.char_to_byte(window_end);
        let window = self.src[byte_start..byte_end].to_lowercase();
        keywords.iter().any(|k| window.contains(&k.to_lowercase()))
    }

    /// Consume the utils, returning collected hits and the rejected-push
    /// count (surfaced as `DetectionReport::hits_dropped_over_cap`).
    pub fn into_hits(self) -> (Vec<Hit>, usize) {
        (self.hits, self.rejected)
    }
}

/// Declared pattern complexity, feeding the scoring weight
/// 0.1 / 0.2 / 0.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternComplexity {
    Low,
    Medium,
    High,
}

impl PatternComplexity {
    pub fn weight(self) -> f32 {
        match self {
            PatternComplexity::Low => 0.1,
            PatternComplexity::Medium => 0.2,
            PatternComplexity::High => 0.3,
        }
    }
}

/// Known boundary character classes shared by the built-in detectors
///: preceded/followed by non-identifier characters.
pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn boundary_ok(src: &str, start: usize, end: usize) -> bool {
    let before_ok = src[..start]
        .chars()
        .next_back()
        .map(|c| !is_identifier_char(c))
        .unwrap_or(true);
    let after_ok = src[end..]
        .chars()
        .next()
        .map(|c| !is_identifier_char(c))
        .unwrap_or(true);
    before_ok && after_ok
}

pub(crate) fn well_known_test_keywords() -> HashSet<&'static str> {
    ["example", "test", "sample", "placeholder", "dummy"]
        .into_iter()
        .collect()
}

pub(crate) fn complexity_str(c: PatternComplexity) -> &'static str {
    match c {
        PatternComplexity::Low => "low",
        PatternComplexity::Medium => "medium",
        PatternComplexity::High => "high",
    }
}

/// Attach the features a built-in detector always knows once it has
/// decided to push a hit: it always matched its whole atomic pattern
/// (`is_complete_match`) at a validated non-identifier boundary
/// (`has_word_boundaries`).
pub(crate) fn annotate_builtin(hit: Hit, complexity: PatternComplexity, checksum_valid: bool) -> Hit {
    hit.with_feature("pattern_complexity", complexity_str(complexity))
        .with_feature("is_complete_match", true)
        .with_feature("has_word_boundaries", true)
        .with_feature("contains_valid_checksum", checksum_valid)
}
