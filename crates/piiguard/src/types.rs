//! Core data model: [`PiiType`], [`Risk`], [`Action`], and [`Hit`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An open-ended PII category tag.
///
/// Built-in detectors use the well-known constants below (`PiiType::EMAIL`,
/// `PiiType::CREDIT_CARD`, ...); plugins mint their own via [`PiiType::new`].
/// Unknown tags are always accepted -- the engine never rejects a `PiiType`
/// it hasn't seen before.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PiiType(Cow<'static, str>);

impl PiiType {
    /// Construct a type from any string-like value.
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    /// The tag as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercased form used in token output (`TKN_<UPPER_TYPE>_...`).
    pub fn to_uppercase(&self) -> String {
        self.0.to_uppercase()
    }

    pub fn email() -> Self {
        Self(Cow::Borrowed("email"))
    }
    pub fn credit_card() -> Self {
        Self(Cow::Borrowed("credit_card"))
    }
    pub fn ipv4() -> Self {
        Self(Cow::Borrowed("ipv4"))
    }
    pub fn ipv6() -> Self {
        Self(Cow::Borrowed("ipv6"))
    }
    pub fn mac() -> Self {
        Self(Cow::Borrowed("mac"))
    }
    pub fn phone_e164() -> Self {
        Self(Cow::Borrowed("phone_e164"))
    }

    /// All built-in types, in the order built-in detectors are registered.
    pub fn built_ins() -> Vec<PiiType> {
        vec![
            Self::email(),
            Self::credit_card(),
            Self::ipv4(),
            Self::ipv6(),
            Self::mac(),
            Self::phone_e164(),
        ]
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PiiType {
    fn from(s: &str) -> Self {
        Self(Cow::Owned(s.to_string()))
    }
}

impl From<String> for PiiType {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

impl Serialize for PiiType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PiiType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PiiType::from(s))
    }
}

/// Informational risk level. Does not affect arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    Low,
    Medium,
    High,
}

/// What to do with a detected hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Mask,
    Remove,
    Tokenize,
    Ignore,
}

/// A scalar feature value extracted during validation/scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

/// A detected span of PII within normalized text.
///
/// Offsets are **character offsets over the normalized string**,
/// not byte offsets -- `value` is always
/// `normalized_text.chars().collect::<String>()[start..end]` in character
/// terms, which this crate enforces by slicing on `char_indices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "type")]
    pub ty: PiiType,
    pub start: usize,
    pub end: usize,
    pub value: String,
    pub risk: Risk,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, FeatureValue>,
}

impl Hit {
    pub fn new(ty: PiiType, start: usize, end: usize, value: impl Into<String>, risk: Risk) -> Self {
        Self {
            ty,
            start,
            end,
            value: value.into(),
            risk,
            priority: 0,
            confidence: None,
            reasons: Vec::new(),
            features: BTreeMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.features.insert(key.into(), value.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    pub fn feature_bool(&self, key: &str) -> bool {
        matches!(self.features.get(key), Some(FeatureValue::Bool(true)))
    }

    /// `0 <= start < end <= len` and `value == src[start..end]` in character terms.
    pub fn is_well_formed(&self, normalized_char_len: usize) -> bool {
        self.start < self.end
            && self.end <= normalized_char_len
            && !self.ty.as_str().is_empty()
    }
}
