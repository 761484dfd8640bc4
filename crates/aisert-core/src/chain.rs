//! The chain controller.
//!
//! An [`Aisert`] owns one piece of content, a resolved configuration and a
//! fresh [`AisertStatus`]. Each `assert_*` call runs one validator, records
//! its outcome under the validator's kind and then either stops the chain
//! (strict) or lets it continue (non-strict). [`Aisert::collect`] reduces the
//! recorded outcomes into an [`AisertReport`].
//!
//! ```ignore
//! let report = Aisert::new(response)
//!     .with_backends(aisert_runtime::registry())
//!     .assert_schema(Schema::of::<Answer>(), false)?
//!     .assert_contains(["refund"], false)?
//!     .assert_tokens(200, false)?
//!     .collect();
//! ```

use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::BackendRegistry;
use crate::config::{AisertConfig, ConfigSource};
use crate::context::{CancellationFlag, ValidationContext};
use crate::error::AisertError;
use crate::report::AisertReport;
use crate::sanitize::sanitize_for_log;
use crate::status::AisertStatus;
use crate::types::{Content, ValidationResult};
use crate::validators::{
    ContainsRule, ContainsValidator, Schema, SchemaValidator, SemanticTarget, SemanticValidator,
    TokenLimit, TokenValidator, Validator, DEFAULT_SEMANTIC_THRESHOLD,
};

/// Fluent validation session over one piece of content.
///
/// Under strict mode a raised validator error comes back as
/// [`AisertError::Validation`] and a failing result as
/// [`AisertError::Rejected`]; either way the failure is recorded first.
/// Under non-strict mode every failure, including misuse of a validator, is
/// recorded as a failing result and the chain continues.
///
/// Collecting does not end the session. Later `assert_*` calls keep updating
/// the same status.
#[derive(Debug)]
pub struct Aisert {
    content: Content,
    config: AisertConfig,
    registry: Arc<BackendRegistry>,
    status: AisertStatus,
    timeout: Option<Duration>,
    cancellation: Option<CancellationFlag>,
    collected: Cell<bool>,
}

impl Aisert {
    /// A session with the default configuration and no model backends.
    pub fn new(content: impl Into<Content>) -> Self {
        Self::with_config(content, ConfigSource::Default)
    }

    /// A session whose configuration comes from `source`.
    ///
    /// Unreadable or malformed sources fall back to defaults; see
    /// [`ConfigSource::resolve`].
    pub fn with_config(content: impl Into<Content>, source: impl Into<ConfigSource>) -> Self {
        let config = source.into().resolve();
        tracing::debug!(
            provider = %config.model_provider,
            token_model = %config.token_model,
            "configured aisert session"
        );
        Self {
            content: content.into(),
            config,
            registry: Arc::new(BackendRegistry::new()),
            status: AisertStatus::new(),
            timeout: None,
            cancellation: None,
            collected: Cell::new(false),
        }
    }

    /// Use `registry` for token counting and embeddings.
    pub fn with_backends(mut self, registry: Arc<BackendRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Bound every model-backed validation call by `timeout`.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn config(&self) -> &AisertConfig {
        &self.config
    }

    pub fn status(&self) -> &AisertStatus {
        &self.status
    }

    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Check the content against a JSON Schema document or a typed model.
    pub fn assert_schema(
        &mut self,
        schema: impl Into<Schema>,
        strict: bool,
    ) -> Result<&mut Self, AisertError> {
        let schema = schema.into();
        self.assert_with(&SchemaValidator::new(), &schema, strict)
    }

    /// Require every item to occur in the content.
    pub fn assert_contains<I, S>(&mut self, items: I, strict: bool) -> Result<&mut Self, AisertError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assert_contains_rule(&ContainsRule::required(items), strict)
    }

    /// Require no item to occur in the content.
    pub fn assert_not_contains<I, S>(
        &mut self,
        items: I,
        strict: bool,
    ) -> Result<&mut Self, AisertError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assert_contains_rule(&ContainsRule::forbidden(items), strict)
    }

    pub fn assert_contains_rule(
        &mut self,
        rule: &ContainsRule,
        strict: bool,
    ) -> Result<&mut Self, AisertError> {
        self.assert_with(&ContainsValidator::new(), rule, strict)
    }

    /// Require the content to fit in `limit` tokens of the configured model.
    pub fn assert_tokens(&mut self, limit: usize, strict: bool) -> Result<&mut Self, AisertError> {
        let validator =
            TokenValidator::new(Arc::clone(&self.registry), self.config.model_provider.clone());
        let limit = TokenLimit {
            limit,
            model: self.config.token_model.clone(),
            encoding: self.config.token_encoding.clone(),
        };
        self.assert_with(&validator, &limit, strict)
    }

    /// Require the content to be semantically close to `reference` at the
    /// default threshold.
    pub fn assert_semantic_matches(
        &mut self,
        reference: &str,
        strict: bool,
    ) -> Result<&mut Self, AisertError> {
        self.assert_semantic_matches_with(reference, DEFAULT_SEMANTIC_THRESHOLD, strict)
    }

    /// # Arguments
    /// * `reference` - Text to compare against
    /// * `threshold` - Minimum cosine similarity, in `[0, 1]`
    /// * `strict` - Stop the chain on failure
    pub fn assert_semantic_matches_with(
        &mut self,
        reference: &str,
        threshold: f32,
        strict: bool,
    ) -> Result<&mut Self, AisertError> {
        let validator = SemanticValidator::new(
            Arc::clone(&self.registry),
            self.config.sentence_transformer_model.clone(),
        );
        let target = SemanticTarget::new(reference).with_threshold(threshold);
        self.assert_with(&validator, &target, strict)
    }

    /// Run any validator under the chain's strict/non-strict policy.
    pub fn assert_with<V: Validator>(
        &mut self,
        validator: &V,
        input: &V::Input,
        strict: bool,
    ) -> Result<&mut Self, AisertError> {
        let kind = validator.kind();
        if self.collected.get() {
            tracing::debug!(validator = %kind, "assert after collect, session continues");
        }

        let started = Instant::now();
        let outcome = validator.validate(&self.content, input, &self.context());
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                let passed = result.status();
                tracing::debug!(
                    validator = %kind,
                    strict,
                    status = passed,
                    elapsed_ms,
                    reason = %sanitize_for_log(result.reason()),
                    "validation finished"
                );
                let reason = (strict && !passed).then(|| result.reason().to_string());
                self.status.update(kind, result);
                if let Some(reason) = reason {
                    return Err(AisertError::Rejected {
                        validator: kind,
                        reason,
                    });
                }
            }
            Err(error) => {
                tracing::debug!(
                    validator = %kind,
                    strict,
                    class = %error.class(),
                    elapsed_ms,
                    error = %sanitize_for_log(&error.to_string()),
                    "validator raised"
                );
                self.status
                    .update(kind, ValidationResult::fail(error.message()));
                if strict {
                    return Err(error.into());
                }
                if error.is_misuse() {
                    tracing::warn!(
                        validator = %kind,
                        error = %sanitize_for_log(error.message()),
                        "validator was misused, recorded as a failure"
                    );
                }
            }
        }

        Ok(self)
    }

    /// Reduce everything recorded so far into a report.
    pub fn collect(&self) -> AisertReport {
        self.collected.set(true);
        let report = AisertReport::from_status(&self.status);
        tracing::debug!(
            status = report.status,
            rules = report.rules.len(),
            "collected report"
        );
        report
    }

    fn context(&self) -> ValidationContext {
        let mut ctx = ValidationContext::unbounded();
        if let Some(timeout) = self.timeout {
            ctx = ctx.with_timeout(timeout);
        }
        if let Some(flag) = &self.cancellation {
            ctx = ctx.with_cancellation(flag.clone());
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::types::ValidatorKind;
    use serde_json::json;

    #[test]
    fn test_collect_without_asserts_is_vacuously_true() {
        let report = Aisert::new("anything").collect();
        assert!(report.status);
        assert!(report.rules.is_empty());
    }

    #[test]
    fn test_strict_failure_is_recorded_then_returned() {
        let mut aisert = Aisert::new("Hello world");
        let err = aisert.assert_contains(["missing"], true).unwrap_err();
        assert!(matches!(err, AisertError::Rejected { validator: ValidatorKind::Contains, .. }));
        assert_eq!(err.reason(), r#"Missing items: ["missing"]"#);

        let report = aisert.collect();
        assert!(!report.status);
        assert_eq!(report.rule("ContainsValidator").unwrap().reason(), err.reason());
    }

    #[test]
    fn test_strict_raised_error_propagates_original() {
        let mut aisert = Aisert::new("not json");
        let err = aisert
            .assert_schema(json!({"type": "object"}), true)
            .unwrap_err();
        match &err {
            AisertError::Validation(inner) => {
                assert_eq!(inner.kind(), ValidatorKind::Schema);
                assert_eq!(inner.class(), ErrorClass::Unsatisfied);
            }
            other => panic!("expected raised schema error, got {other:?}"),
        }
        assert!(!aisert.status().get(ValidatorKind::Schema).unwrap().status());
    }

    #[test]
    fn test_non_strict_chain_continues() {
        let mut aisert = Aisert::new(r#"{"answer": "Paris"}"#);
        let report = aisert
            .assert_schema(json!({"type": "array"}), false)
            .unwrap()
            .assert_contains(["Paris"], false)
            .unwrap()
            .collect();

        assert!(!report.status);
        assert!(!report.rule("SchemaValidator").unwrap().status());
        assert!(report.rule("ContainsValidator").unwrap().status());
    }

    #[test]
    fn test_missing_backend_degrades_under_non_strict() {
        let mut aisert = Aisert::new("hello");
        aisert.assert_tokens(10, false).unwrap();
        let token = aisert.status().get(ValidatorKind::Token).unwrap();
        assert!(!token.status());
        assert!(token.reason().contains("Unknown token provider"));
    }

    #[test]
    fn test_asserts_after_collect_keep_updating() {
        let mut aisert = Aisert::new("Hello world");
        aisert.assert_contains(["Hello"], false).unwrap();
        assert!(aisert.collect().status);

        aisert.assert_not_contains(["world"], false).unwrap();
        let report = aisert.collect();
        assert!(!report.status);
        assert_eq!(report.rules.len(), 1);
    }

    #[test]
    fn test_config_source_is_resolved() {
        let aisert = Aisert::with_config(
            "x",
            json!({"model_provider": "anthropic", "token_model": "claude-3-5-haiku-latest"}),
        );
        assert_eq!(aisert.config().model_provider, "anthropic");
    }
}
