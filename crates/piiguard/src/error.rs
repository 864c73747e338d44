//! Error taxonomy for the PII engine.
//!
//! Configuration errors are fatal and surfaced to the caller at construction
//! time. Runtime detector failures and stream decode issues are not modeled
//! as `Result` errors at all -- they degrade to logged, non-fatal events
//! (see [`crate::registry::DetectionReport`]) per the propagation policy:
//! a single misbehaving detector or a binary-looking chunk must never fail
//! the whole call.

use thiserror::Error;

/// Fatal errors raised while constructing a [`crate::policy::Policy`] or
/// [`crate::registry::Registry`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `tokenize` is an effective action somewhere in the policy but
    /// `hmac_key` is missing or shorter than 32 bytes.
    #[error("hmac_key must be present and at least 32 bytes when any effective action is tokenize (got {0} bytes)")]
    WeakKey(usize),

    /// An action string did not match any known [`crate::types::Action`] variant.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A user-supplied detector regex failed to compile.
    #[error("invalid pattern for detector `{detector}`: {source}")]
    InvalidPattern {
        detector: String,
        #[source]
        source: regex::Error,
    },

    /// The policy document failed to deserialize.
    #[error("invalid policy document: {0}")]
    InvalidDocument(String),
}
