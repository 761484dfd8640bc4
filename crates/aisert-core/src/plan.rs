//! Declarative validation plans.
//!
//! A plan is the chain expression written down as data, so the same checks
//! can be loaded from YAML/JSON and applied to many responses:
//!
//! ```yaml
//! strict: false
//! steps:
//!   - validator: schema
//!     schema: { type: object, required: [answer] }
//!   - validator: contains
//!     items: [refund]
//!   - validator: contains
//!     items: [password, ssn]
//!     invert: true
//!   - validator: tokens
//!     limit: 200
//!   - validator: semantic
//!     reference: "The refund was approved."
//!     threshold: 0.7
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::chain::Aisert;
use crate::context::ValidationContext;
use crate::error::{AisertError, ValidationError};
use crate::report::AisertReport;
use crate::types::{Content, ValidationResult, ValidatorKind};
use crate::validators::{ContainsRule, ContainsValidator, Validator, DEFAULT_SEMANTIC_THRESHOLD};

/// Errors from loading a plan.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Failed to read plan file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn default_threshold() -> f32 {
    DEFAULT_SEMANTIC_THRESHOLD
}

/// One chain call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "validator", rename_all = "snake_case")]
pub enum Step {
    /// JSON Schema conformance.
    Schema { schema: Value },

    /// Required (or, inverted, forbidden) items. Items are checked when the
    /// step runs, so a malformed list is reported like any other misuse.
    Contains {
        items: Value,
        #[serde(default)]
        invert: bool,
    },

    /// Token budget for the configured model.
    Tokens { limit: usize },

    /// Semantic similarity to a reference text.
    Semantic {
        reference: String,
        #[serde(default = "default_threshold")]
        threshold: f32,
    },
}

impl Step {
    pub fn kind(&self) -> ValidatorKind {
        match self {
            Step::Schema { .. } => ValidatorKind::Schema,
            Step::Contains { .. } => ValidatorKind::Contains,
            Step::Tokens { .. } => ValidatorKind::Token,
            Step::Semantic { .. } => ValidatorKind::Semantic,
        }
    }

    /// Run this step against `aisert`.
    pub fn apply(&self, aisert: &mut Aisert, strict: bool) -> Result<(), AisertError> {
        match self {
            Step::Schema { schema } => aisert.assert_schema(schema.clone(), strict)?,
            Step::Contains { items, invert } => aisert.assert_with(
                &UntypedContains,
                &UntypedRule {
                    items: items.clone(),
                    invert: *invert,
                },
                strict,
            )?,
            Step::Tokens { limit } => aisert.assert_tokens(*limit, strict)?,
            Step::Semantic {
                reference,
                threshold,
            } => aisert.assert_semantic_matches_with(reference, *threshold, strict)?,
        };
        Ok(())
    }
}

struct UntypedRule {
    items: Value,
    invert: bool,
}

/// Contains check over an item list that has not been type-checked yet.
struct UntypedContains;

impl Validator for UntypedContains {
    type Input = UntypedRule;

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Contains
    }

    fn validate(
        &self,
        content: &Content,
        input: &UntypedRule,
        ctx: &ValidationContext,
    ) -> Result<ValidationResult, ValidationError> {
        let rule = ContainsRule::from_value(&input.items, input.invert)?;
        ContainsValidator::new().validate(content, &rule, ctx)
    }
}

/// An ordered list of steps plus the chain policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Stop at the first failing step.
    #[serde(default)]
    pub strict: bool,

    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            strict: false,
            steps,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PlanError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a file: JSON for `.json`, YAML otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// True when some step runs a validator of `kind`.
    pub fn uses(&self, kind: ValidatorKind) -> bool {
        self.steps.iter().any(|step| step.kind() == kind)
    }

    /// Run every step in order; under strict mode stop at the first failure.
    pub fn apply(&self, aisert: &mut Aisert) -> Result<(), AisertError> {
        for step in &self.steps {
            step.apply(aisert, self.strict)?;
        }
        Ok(())
    }

    /// Run the plan and collect, whether or not a strict step stopped it.
    pub fn evaluate(&self, aisert: &mut Aisert) -> AisertReport {
        if let Err(e) = self.apply(aisert) {
            tracing::debug!(validator = %e.kind(), error = %e, "plan stopped early");
        }
        aisert.collect()
    }
}
