//! Token budget checks through a provider-specific counter.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::Validator;
use crate::backend::{BackendError, BackendRegistry};
use crate::context::ValidationContext;
use crate::error::{ErrorClass, ValidationError};
use crate::types::{Content, ValidationResult, ValidatorKind};

/// Upper bound on the token count of the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLimit {
    pub limit: usize,

    /// Provider-specific model identifier.
    pub model: String,

    /// Encoding override for providers that count by encoding name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl TokenLimit {
    pub fn new(limit: usize, model: impl Into<String>) -> Self {
        Self {
            limit,
            model: model.into(),
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }
}

/// Counts tokens with the configured provider and compares against a limit.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    registry: Arc<BackendRegistry>,
    provider: String,
}

impl TokenValidator {
    pub fn new(registry: Arc<BackendRegistry>, provider: impl Into<String>) -> Self {
        Self {
            registry,
            provider: provider.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn backend_error(limit: &TokenLimit, error: BackendError) -> ValidationError {
        let class = if error.is_misuse() {
            ErrorClass::InvalidInput
        } else if matches!(error, BackendError::Interrupted(_)) {
            ErrorClass::Interrupted
        } else {
            ErrorClass::Backend
        };
        ValidationError::token(class, &limit.model, error.to_string())
    }
}

impl Validator for TokenValidator {
    type Input = TokenLimit;

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Token
    }

    fn validate(
        &self,
        content: &Content,
        limit: &TokenLimit,
        ctx: &ValidationContext,
    ) -> Result<ValidationResult, ValidationError> {
        ctx.check(ValidatorKind::Token)?;

        let counter = self
            .registry
            .token_counter(&self.provider, &limit.model, limit.encoding.as_deref())
            .map_err(|e| Self::backend_error(limit, e))?;

        let started = Instant::now();
        let owned = content.clone();
        let count = ctx
            .run_bounded(ValidatorKind::Token, move |worker_ctx| {
                counter.count_content(&owned, &worker_ctx)
            })?
            .map_err(|e| match ctx.check(ValidatorKind::Token) {
                Err(interrupted) => interrupted,
                Ok(()) => Self::backend_error(limit, e),
            })?;
        ctx.check(ValidatorKind::Token)?;

        tracing::debug!(
            provider = %self.provider,
            model = %limit.model,
            count,
            limit = limit.limit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "counted tokens"
        );

        if count > limit.limit {
            return Err(ValidationError::token(
                ErrorClass::Unsatisfied,
                &limit.model,
                format!(
                    "Token limit exceeded: {} tokens found, limit is {}",
                    count, limit.limit
                ),
            ));
        }

        Ok(ValidationResult::pass(format!(
            "Token count {} is within limit {}",
            count, limit.limit
        )))
    }
}
