//! The orchestrator: owns policy, detectors, maskers, and the
//! compiled allow/deny manager, and drives the detect/redact pipeline.

use std::collections::HashMap;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::allow_deny::AllowDenyManager;
use crate::arbitration::arbitrate;
use crate::confidence::{features_from_hit, passes_strictness, score};
use crate::detector::{
    credit_card::CreditCardDetector, email::EmailDetector, ipv4::Ipv4Detector, ipv6::Ipv6Detector,
    mac::MacDetector, phone::PhoneDetector, DetectUtils,
};
use crate::detector::Detector;
use crate::error::ConfigError;
use crate::masking::{emit_replacement, MaskerFn};
use crate::normalize::{char_len, context_window, line_at, normalize, CONTEXT_RADIUS};
use crate::policy::{Policy, Rule};
use crate::types::{Hit, PiiType};

/// Non-fatal outcomes from a single `detect`/`redact` call: a
/// misbehaving detector never fails the call, it's recorded here instead.
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    pub detector_failures: Vec<(String, String)>,
    pub hits_dropped_over_cap: usize,
}

/// Per-call overrides to the active policy's per-type rules, keyed by
/// `PiiType`. Anything not present falls back to the registry's policy.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rules: HashMap<PiiType, Rule>,
}

/// The live engine state. Construct once, reuse across many calls;
/// `redact`/`detect` are safe to call concurrently from many threads as
/// long as no `use_detectors` call is racing.
pub struct Registry {
    policy: RwLock<Arc<Policy>>,
    detectors: RwLock<Vec<Box<dyn Detector>>>,
    maskers: RwLock<HashMap<PiiType, MaskerFn>>,
    context_hints: RwLock<HashSet<String>>,
    allow_deny: RwLock<Arc<AllowDenyManager>>,
}

impl Registry {
    /// Validate the policy, compile the allow/deny manager, and install
    /// built-in detectors.
    pub fn new(policy: Policy) -> Result<Self, ConfigError> {
        policy.validate()?;
        info!(
            environment = ?policy.environment,
            sensitivity = ?policy.sensitivity,
            "constructing pii registry"
        );
        let allow_deny = AllowDenyManager::new(policy.environment, &policy.allow_deny_config);
        let context_hints = policy.context_hints.clone();
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(EmailDetector),
            Box::new(CreditCardDetector),
            Box::new(Ipv4Detector),
            Box::new(Ipv6Detector),
            Box::new(MacDetector),
            Box::new(PhoneDetector),
        ];
        Ok(Self {
            policy: RwLock::new(Arc::new(policy)),
            detectors: RwLock::new(detectors),
            maskers: RwLock::new(HashMap::new()),
            context_hints: RwLock::new(context_hints),
            allow_deny: RwLock::new(Arc::new(allow_deny)),
        })
    }

    /// Register plugin detectors/maskers/hints. Later calls are
    /// appended after earlier ones, so at equal declared priority a
    /// detector from an earlier `use_detectors` call still runs first;
    /// maskers merge with later entries overriding earlier ones for the
    /// same type; hints union.
    pub fn use_detectors(
        &self,
        detectors: Vec<Box<dyn Detector>>,
        maskers: HashMap<PiiType, MaskerFn>,
        hints: HashSet<String>,
    ) {
        info!(count = detectors.len(), "registering plugin detectors");
        self.detectors.write().expect("detector list lock poisoned").extend(detectors);
        self.maskers.write().expect("masker map lock poisoned").extend(maskers);
        self.context_hints
            .write()
            .expect("context hint set lock poisoned")
            .extend(hints);
    }

    pub fn masker_for(&self, ty: &PiiType) -> Option<MaskerFn> {
        self.maskers.read().expect("masker map lock poisoned").get(ty).cloned()
    }

    /// A cheap snapshot of the currently active policy.
    pub fn policy(&self) -> Arc<Policy> {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    /// Atomically swap in a new policy document, recompiling the
    /// allow/deny manager.
    pub fn swap_policy(&self, new_policy: Policy) -> Result<(), ConfigError> {
        new_policy.validate()?;
        let allow_deny = AllowDenyManager::new(new_policy.environment, &new_policy.allow_deny_config);
        *self.allow_deny.write().expect("allow/deny lock poisoned") = Arc::new(allow_deny);
        *self.policy.write().expect("policy lock poisoned") = Arc::new(new_policy);
        info!("swapped active policy");
        Ok(())
    }

    /// Run the full detection pipeline: normalize, collect raw hits,
    /// validate & score, allow/deny filter, arbitrate.
    pub fn detect(&self, text: &str, extra_hints: Option<&HashSet<String>>) -> (String, Vec<Hit>, DetectionReport) {
        let policy = self.policy();
        let src = normalize(text);

        let mut hints: HashSet<String> = self
            .context_hints
            .read()
            .expect("context hint set lock poisoned")
            .iter()
            .map(|h| h.to_lowercase())
            .collect();
        if let Some(extra) = extra_hints {
            hints.extend(extra.iter().map(|h| h.to_lowercase()));
        }

        let detectors = self.detectors.read().expect("detector list lock poisoned");
        let mut ordered: Vec<&Box<dyn Detector>> = detectors.iter().collect();
        ordered.sort_by_key(|d| d.priority());

        let mut utils = DetectUtils::new(&src);
        let mut report = DetectionReport::default();
        for detector in &ordered {
            let id = detector.id().to_string();
            let result = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&mut utils)));
            if let Err(payload) = result {
                let message = panic_message(&payload);
                warn!(detector = %id, error = %message, "detector failed; discarding its output for this call");
                report.detector_failures.push((id, message));
            }
        }
        let (raw_hits, rejected) = utils.into_hits();
        report.hits_dropped_over_cap = rejected;
        if rejected > 0 {
            warn!(rejected, "hit cap exceeded; remaining pushes dropped");
        }

        let allow_deny = self.allow_deny.read().expect("allow/deny lock poisoned").clone();
        let threshold = policy.effective_threshold();
        let src_char_len = char_len(&src);

        let mut survivors = Vec::new();
        for mut hit in raw_hits {
            if !hit.is_well_formed(src_char_len) {
                continue;
            }
            let window = context_window(&src, hit.start, CONTEXT_RADIUS);
            let context_hint_nearby = hints.iter().any(|h| window.contains(h.as_str()));
            let line = line_at(&src, hit.start);
            let forced_keep = allow_deny.is_denylisted(&hit.ty, &hit.value);
            let in_test_context = !forced_keep && is_in_test_context(line);

            let features = features_from_hit(&hit, context_hint_nearby, in_test_context);

            if policy.enable_confidence_scoring {
                let confidence = score(&features);
                hit.confidence = Some(confidence);
                if !forced_keep && confidence < threshold {
                    debug!(ty = %hit.ty, confidence, threshold, "below confidence threshold, discarding");
                    continue;
                }
            }

            if !passes_strictness(policy.validation_strictness, &features, &hit, forced_keep) {
                continue;
            }

            if !forced_keep && allow_deny.is_allowed(&hit.ty, &hit.value, line) {
                debug!(ty = %hit.ty, value_len = hit.value.len(), "allowed, discarding");
                continue;
            }
            survivors.push(hit);
        }

        let arbitrated = arbitrate(survivors);
        (src, arbitrated, report)
    }

    /// Apply the resolved action per hit and assemble the redacted text
    ///.
    pub fn redact(&self, text: &str, overrides: Option<&Overrides>) -> String {
        let policy = self.policy();
        let (src, hits, _report) = self.detect(text, None);
        let mut out = String::with_capacity(src.len());
        let mut prev_end = 0usize;
        let src_chars: Vec<char> = src.chars().collect();

        for hit in &hits {
            out.extend(&src_chars[prev_end..hit.start]);
            let rule = overrides
                .and_then(|o| o.rules.get(&hit.ty))
                .cloned()
                .unwrap_or_else(|| policy.rule_for(&hit.ty));
            let masker = self.masker_for(&hit.ty);
            let replacement = emit_replacement(hit, &rule, masker.as_ref(), policy.hmac_key.as_deref());
            out.push_str(&replacement);
            prev_end = hit.end;
        }
        out.extend(&src_chars[prev_end..]);
        out
    }
}

fn is_in_test_context(line: &str) -> bool {
    let lower = line.to_lowercase();
    crate::detector::well_known_test_keywords()
        .iter()
        .any(|kw| lower.contains(kw))
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "detector panicked with a non-string payload".to_string()
    }
}
