//! Counting and embedding backends.
//!
//! aisert-core never talks to a model itself. Token validators go through a
//! [`TokenCounter`] and semantic validators through an [`Embedder`], both
//! created on demand by factories registered in a [`BackendRegistry`].
//! Concrete backends live in `aisert-runtime`.
//!
//! Every backend call receives the caller's [`ValidationContext`]. Backends
//! that wait on I/O should stop once [`ValidationContext::interruption`]
//! reports a reason and return [`BackendError::Interrupted`].

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::context::ValidationContext;
use crate::types::Content;

mod registry;

pub use registry::BackendRegistry;

/// Errors from counting and embedding backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),
}

impl BackendError {
    /// True when the backend was asked for something it cannot provide,
    /// as opposed to failing while providing it.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            BackendError::NotConfigured(_) | BackendError::UnsupportedModel(_)
        )
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http(_) | BackendError::RateLimited { .. } | BackendError::Timeout(_) => {
                true
            }
            BackendError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Counts tokens the way one model's tokenizer does.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str, ctx: &ValidationContext) -> Result<usize, BackendError>;

    /// Number of tokens in `content`.
    ///
    /// Structured content is counted as its JSON text unless the backend
    /// understands the structure natively.
    fn count_content(
        &self,
        content: &Content,
        ctx: &ValidationContext,
    ) -> Result<usize, BackendError> {
        self.count(&content.as_text(), ctx)
    }

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Turns text into a dense embedding vector.
pub trait Embedder: Send + Sync {
    fn encode(&self, text: &str, ctx: &ValidationContext) -> Result<Vec<f32>, BackendError>;

    /// Embedding model identifier.
    fn model(&self) -> &str;
}

/// Creates token counters for one provider.
///
/// Register implementations with [`BackendRegistry::register_counter`] to add
/// a provider without touching the token validator.
pub trait TokenCounterFactory: Send + Sync {
    /// Provider name matched against `model_provider` in the configuration.
    ///
    /// Examples: "openai", "huggingface", "anthropic", "google"
    fn provider(&self) -> &'static str;

    /// Create a counter.
    ///
    /// # Arguments
    /// * `model` - Provider-specific model identifier (may be empty)
    /// * `encoding` - Optional encoding override
    fn create(&self, model: &str, encoding: Option<&str>)
        -> Result<Arc<dyn TokenCounter>, BackendError>;

    /// Key under which created counters are cached.
    ///
    /// Counters that only depend on the encoding share one instance across
    /// models.
    fn cache_key(&self, model: &str, encoding: Option<&str>) -> String {
        format!("{}:{}", self.provider(), encoding.unwrap_or(model))
    }

    fn description(&self) -> &'static str {
        "Token counter"
    }
}

/// Creates embedding models.
pub trait EmbedderFactory: Send + Sync {
    fn create(&self, model: &str) -> Result<Arc<dyn Embedder>, BackendError>;

    fn description(&self) -> &'static str {
        "Embedding model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str, _ctx: &ValidationContext) -> Result<usize, BackendError> {
            Ok(text.split_whitespace().count())
        }

        fn name(&self) -> &str {
            "words"
        }
    }

    #[test]
    fn test_count_content_uses_json_text() {
        let content = Content::from(serde_json::json!({"a": "b c"}));
        let ctx = ValidationContext::unbounded();
        assert_eq!(WordCounter.count_content(&content, &ctx).unwrap(), 2);
    }

    #[test]
    fn test_error_classification() {
        assert!(BackendError::UnsupportedModel("x".into()).is_misuse());
        assert!(!BackendError::Http("reset".into()).is_misuse());
        assert!(BackendError::Api {
            status: 503,
            message: "overloaded".into()
        }
        .is_retryable());
        assert!(!BackendError::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!BackendError::Auth("missing key".into()).is_retryable());
        assert!(!BackendError::Interrupted("validation cancelled".into()).is_retryable());
    }
}
