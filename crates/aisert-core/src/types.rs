//! Value types shared by every validator: the validated content, the
//! validator identity, and the per-validator outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Closed set of validator identities.
///
/// Used as the aggregation key for [`AisertStatus`](crate::AisertStatus) and
/// [`AisertReport`](crate::AisertReport). Declaration order is the reporting
/// order; the derived `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValidatorKind {
    #[serde(rename = "SchemaValidator")]
    Schema,
    #[serde(rename = "ContainsValidator")]
    Contains,
    #[serde(rename = "TokenValidator")]
    Token,
    #[serde(rename = "SemanticValidator")]
    Semantic,
}

impl ValidatorKind {
    /// Every identity, in reporting order.
    pub const ALL: [ValidatorKind; 4] = [
        ValidatorKind::Schema,
        ValidatorKind::Contains,
        ValidatorKind::Token,
        ValidatorKind::Semantic,
    ];

    /// Stable string tag, used as the key in serialized reports.
    pub fn name(self) -> &'static str {
        match self {
            ValidatorKind::Schema => "SchemaValidator",
            ValidatorKind::Contains => "ContainsValidator",
            ValidatorKind::Token => "TokenValidator",
            ValidatorKind::Semantic => "SemanticValidator",
        }
    }

    /// Look up an identity by its string tag.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Membership test over the string tags.
    pub fn is_member(name: &str) -> bool {
        Self::from_name(name).is_some()
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one validation: pass/fail plus a human-readable reason.
///
/// Immutable once built. Serializes as `{"status": .., "reason": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    status: bool,
    reason: String,
}

impl ValidationResult {
    pub fn new(status: bool, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn pass(reason: impl Into<String>) -> Self {
        Self::new(true, reason)
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::new(false, reason)
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// `{status, reason}` as a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "status": self.status,
            "reason": self.reason,
        })
    }
}

/// The payload under validation.
///
/// Content is never canonicalized at construction; each validator decides how
/// to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Raw response text.
    Text(String),

    /// Already-parsed structured data.
    Structured(Value),
}

impl Content {
    /// The content as text: strings as-is, structured values as compact JSON.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Content::Text(text) => Cow::Borrowed(text),
            Content::Structured(Value::String(text)) => Cow::Borrowed(text),
            Content::Structured(value) => Cow::Owned(value.to_string()),
        }
    }

    /// The content if it is plain text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Structured(_) => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Structured(Value::Null) => "null",
            Content::Structured(Value::Bool(_)) => "boolean",
            Content::Structured(Value::Number(_)) => "number",
            Content::Structured(Value::String(_)) => "string",
            Content::Structured(Value::Array(_)) => "array",
            Content::Structured(Value::Object(_)) => "object",
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&String> for Content {
    fn from(text: &String) -> Self {
        Content::Text(text.clone())
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Content::Structured(value)
    }
}
