//! Policy configuration: [`Policy`], [`Rule`], environment/sensitivity knobs,
//! and the allow/deny override document.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Action, PiiType};

/// Deployment environment. Drives the [`crate::allow_deny::AllowDenyManager`]
/// defaults: `production` ships a minimal allowlist, `test` and
/// `development` additionally exempt RFC-reserved documentation patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Test,
    Development,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Production
    }
}

/// Coarse sensitivity knob; selects a confidence threshold unless
/// `confidence_threshold` is set explicitly (it takes precedence, see
/// `DESIGN.md`'s resolution of the corresponding open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Strict,
    Balanced,
    Relaxed,
}

impl Sensitivity {
    pub fn threshold(self) -> f32 {
        match self {
            Sensitivity::Strict => 0.8,
            Sensitivity::Balanced => 0.5,
            Sensitivity::Relaxed => 0.3,
        }
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Sensitivity::Balanced
    }
}

/// How aggressively validation rejects otherwise syntactically-valid hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStrictness {
    Fast,
    Balanced,
    Strict,
}

impl Default for ValidationStrictness {
    fn default() -> Self {
        ValidationStrictness::Balanced
    }
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mask" => Ok(Action::Mask),
            "remove" => Ok(Action::Remove),
            "tokenize" => Ok(Action::Tokenize),
            "ignore" => Ok(Action::Ignore),
            other => Err(ConfigError::UnknownAction(other.to_string())),
        }
    }
}

/// Per-type override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub action: Action,
    #[serde(default)]
    pub preserve_last4: bool,
}

impl Rule {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            preserve_last4: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Allow/deny override document (the configuration schema's
/// `allowDenyConfig`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllowDenyConfig {
    pub custom_allowlist: HashMap<PiiType, Vec<String>>,
    pub custom_denylist: HashMap<PiiType, Vec<String>>,
    pub allow_private_ips: bool,
    pub allow_test_patterns: bool,
}

/// The HMAC tokenization key, wrapped so it is zeroed on drop without
/// making [`Policy`] itself a `Drop` type — a `Drop` impl on `Policy` would
/// make every `Policy { ..., ..Policy::default() }` functional update a
/// compile error (E0509: cannot move out of a `Drop` type's fields).
#[derive(Clone)]
pub struct HmacKey(Vec<u8>);

impl HmacKey {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for HmacKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl std::ops::Deref for HmacKey {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HmacKey(..)")
    }
}

impl Drop for HmacKey {
    fn drop(&mut self) {
        for b in self.0.iter_mut() {
            unsafe { std::ptr::write_volatile(b, 0) };
        }
    }
}

/// The active configuration.
///
/// Deserializes from the JSON/YAML configuration schema; unknown top-level
/// keys are rejected so typos in hand-written policy documents fail loudly
/// at load time rather than silently no-op'ing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Policy {
    pub default_action: Action,
    pub rules: HashMap<PiiType, Rule>,
    #[serde(with = "opt_base64", default)]
    pub hmac_key: Option<HmacKey>,
    pub context_hints: HashSet<String>,
    pub environment: Environment,
    pub sensitivity: Sensitivity,
    pub confidence_threshold: Option<f32>,
    #[serde(default = "default_true")]
    pub enable_confidence_scoring: bool,
    pub validation_strictness: ValidationStrictness,
    pub enable_json_detection: bool,
    pub allow_deny_config: AllowDenyConfig,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            default_action: Action::Mask,
            rules: HashMap::new(),
            hmac_key: None,
            context_hints: HashSet::new(),
            environment: Environment::default(),
            sensitivity: Sensitivity::default(),
            confidence_threshold: None,
            enable_confidence_scoring: true,
            validation_strictness: ValidationStrictness::default(),
            enable_json_detection: false,
            allow_deny_config: AllowDenyConfig::default(),
        }
    }
}

impl Policy {
    pub fn from_yaml(s: &str) -> Result<Self, ConfigError> {
        let policy: Policy =
            serde_yaml::from_str(s).map_err(|e| ConfigError::InvalidDocument(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let policy: Policy =
            serde_json::from_str(s).map_err(|e| ConfigError::InvalidDocument(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Action actually applied to a hit of the given type.
    pub fn rule_for(&self, ty: &PiiType) -> Rule {
        self.rules
            .get(ty)
            .cloned()
            .unwrap_or_else(|| Rule::new(self.default_action))
    }

    /// `confidence_threshold` wins over the sensitivity-derived default.
    pub fn effective_threshold(&self) -> f32 {
        self.confidence_threshold
            .unwrap_or_else(|| self.sensitivity.threshold())
    }

    fn effective_actions(&self) -> impl Iterator<Item = Action> + '_ {
        std::iter::once(self.default_action).chain(self.rules.values().map(|r| r.action))
    }

    /// Validate construction-time invariants.
    ///
    /// `tokenize` anywhere in the effective action set requires an
    /// `hmac_key` of at least 32 bytes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let needs_key = self.effective_actions().any(|a| a == Action::Tokenize);
        if needs_key {
            let len = self.hmac_key.as_ref().map(|k| k.len()).unwrap_or(0);
            if len < 32 {
                return Err(ConfigError::WeakKey(len));
            }
        }
        Ok(())
    }
}

mod opt_base64 {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(key: &Option<HmacKey>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match key {
            Some(bytes) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&**bytes))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<HmacKey>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) => {
                // Accept either base64 or a raw ASCII key, the way most
                // hand-written policy documents paste a passphrase literal.
                match base64::engine::general_purpose::STANDARD.decode(&s) {
                    Ok(bytes) => Ok(Some(HmacKey::from(bytes))),
                    Err(_) => Ok(Some(HmacKey::from(s.into_bytes()))),
                }
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        let policy = Policy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.effective_threshold(), 0.5);
    }

    #[test]
    fn tokenize_without_key_is_weak_key_error() {
        let policy = Policy {
            default_action: Action::Tokenize,
            ..Policy::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(matches!(err, ConfigError::WeakKey(0)));
    }

    #[test]
    fn tokenize_with_short_key_is_weak_key_error() {
        let policy = Policy {
            default_action: Action::Tokenize,
            hmac_key: Some(HmacKey::from(vec![0u8; 10])),
            ..Policy::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(matches!(err, ConfigError::WeakKey(10)));
    }

    #[test]
    fn tokenize_with_32_byte_key_is_valid() {
        let policy = Policy {
            default_action: Action::Tokenize,
            hmac_key: Some(HmacKey::from(vec![7u8; 32])),
            ..Policy::default()
        };
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn confidence_threshold_overrides_sensitivity() {
        let policy = Policy {
            sensitivity: Sensitivity::Strict,
            confidence_threshold: Some(0.42),
            ..Policy::default()
        };
        assert_eq!(policy.effective_threshold(), 0.42);
    }

    #[test]
    fn from_yaml_parses_schema_shape() {
        let yaml = r#"
defaultAction: mask
rules:
  credit_card:
    action: tokenize
    preserveLast4: true
hmacKey: "0123456789abcdef0123456789abcdef"
environment: test
sensitivity: strict
"#;
        let policy = Policy::from_yaml(yaml).expect("valid policy with 32-byte key");
        assert_eq!(policy.environment, Environment::Test);
        assert_eq!(policy.sensitivity, Sensitivity::Strict);
        let rule = policy.rule_for(&PiiType::credit_card());
        assert_eq!(rule.action, Action::Tokenize);
        assert!(rule.preserve_last4);
    }

    #[test]
    fn from_yaml_rejects_unknown_fields() {
        let yaml = "defaultAction: mask\nbogusField: 1\n";
        assert!(Policy::from_yaml(yaml).is_err());
    }

    #[test]
    fn action_from_str_rejects_unknown_action() {
        let err = Action::from_str("quarantine").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAction(s) if s == "quarantine"));
    }
}
