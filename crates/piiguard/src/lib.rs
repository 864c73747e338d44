//! `piiguard` — a streaming PII detection, masking, and deterministic
//! tokenization engine intended to run at the edge of an application:
//! log pipelines, request/response proxies, and job inputs where
//! sensitive values must be stripped before persistence or forwarding.
//!
//! The synchronous core ([`Registry::detect`]/[`Registry::redact`]) never
//! suspends and never fails due to a single misbehaving detector; the
//! streaming adapter ([`create_redaction_transform`]) carries that same
//! guarantee across arbitrarily-chunked byte streams without splitting a
//! PII span or corrupting binary regions.

mod allow_deny;
mod arbitration;
mod confidence;
mod detector;
mod error;
mod masking;
mod normalize;
mod policy;
mod registry;
mod stream;
mod types;

pub use detector::{Detector, DetectUtils, PatternComplexity};
pub use error::ConfigError;
pub use masking::{default_masker, preserve_last4_masker, tokenize, MaskerFn};
pub use normalize::{context_window, normalize};
pub use policy::{
    AllowDenyConfig, Environment, HmacKey, Policy, Rule, Sensitivity, ValidationStrictness,
};
pub use registry::{DetectionReport, Overrides, Registry};
pub use stream::{create_redaction_transform, RedactionTransform, TransformOptions, DEFAULT_WINDOW};
pub use types::{Action, FeatureValue, Hit, PiiType, Risk};

/// Free-function wrapper around [`Registry::redact`].
pub fn redact_text(registry: &Registry, text: &str, overrides: Option<&Overrides>) -> String {
    registry.redact(text, overrides)
}
