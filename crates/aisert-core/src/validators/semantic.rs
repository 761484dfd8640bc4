//! Embedding-based similarity against a reference text.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::Validator;
use crate::backend::{BackendError, BackendRegistry};
use crate::context::ValidationContext;
use crate::error::{ErrorClass, ValidationError};
use crate::similarity::cosine_similarity;
use crate::types::{Content, ValidationResult, ValidatorKind};

/// Minimum similarity used when none is given.
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.8;

fn default_threshold() -> f32 {
    DEFAULT_SEMANTIC_THRESHOLD
}

/// Reference text and the minimum cosine similarity required to pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticTarget {
    pub reference: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl SemanticTarget {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            threshold: DEFAULT_SEMANTIC_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Compares content and reference embeddings from one embedding model.
#[derive(Debug, Clone)]
pub struct SemanticValidator {
    registry: Arc<BackendRegistry>,
    model: String,
}

impl SemanticValidator {
    pub fn new(registry: Arc<BackendRegistry>, model: impl Into<String>) -> Self {
        Self {
            registry,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn backend_error(error: BackendError) -> ValidationError {
        let class = if error.is_misuse() {
            ErrorClass::InvalidInput
        } else if matches!(error, BackendError::Interrupted(_)) {
            ErrorClass::Interrupted
        } else {
            ErrorClass::Backend
        };
        ValidationError::semantic(class, error.to_string())
    }
}

impl Validator for SemanticValidator {
    type Input = SemanticTarget;

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Semantic
    }

    fn validate(
        &self,
        content: &Content,
        target: &SemanticTarget,
        ctx: &ValidationContext,
    ) -> Result<ValidationResult, ValidationError> {
        let threshold = target.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ValidationError::semantic(
                ErrorClass::InvalidInput,
                format!("Threshold must be between 0 and 1, got {threshold}"),
            ));
        }

        let text = match content {
            Content::Text(text) | Content::Structured(Value::String(text)) => text.as_str(),
            other => {
                return Err(ValidationError::semantic(
                    ErrorClass::InvalidInput,
                    format!("Both inputs must be strings, got {}", other.type_name()),
                ))
            }
        };

        ctx.check(ValidatorKind::Semantic)?;
        let embedder = self
            .registry
            .embedder(&self.model)
            .map_err(Self::backend_error)?;

        let started = Instant::now();
        let texts = (text.to_owned(), target.reference.clone());
        let (content_vector, reference_vector) = ctx
            .run_bounded(ValidatorKind::Semantic, move |worker_ctx| -> Result<_, BackendError> {
                let content_vector = embedder.encode(&texts.0, &worker_ctx)?;
                let reference_vector = embedder.encode(&texts.1, &worker_ctx)?;
                Ok((content_vector, reference_vector))
            })?
            .map_err(|e| match ctx.check(ValidatorKind::Semantic) {
                Err(interrupted) => interrupted,
                Ok(()) => Self::backend_error(e),
            })?;
        ctx.check(ValidatorKind::Semantic)?;

        let score = cosine_similarity(&content_vector, &reference_vector).ok_or_else(|| {
            ValidationError::semantic(
                ErrorClass::Backend,
                format!(
                    "Embedding dimensions differ: {} vs {}",
                    content_vector.len(),
                    reference_vector.len()
                ),
            )
        })?;

        tracing::debug!(
            model = %self.model,
            score,
            threshold,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compared embeddings"
        );

        Ok(ValidationResult::new(
            score >= threshold,
            format!("Semantic similarity score: {score}, Threshold: {threshold}"),
        ))
    }
}
