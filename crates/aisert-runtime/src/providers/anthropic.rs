//! Anthropic token counting through the `messages/count_tokens` endpoint.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed when the
//! request header is set. See the [`secrets`](super::secrets) module.

use aisert_core::{BackendError, Content, TokenCounter, TokenCounterFactory, ValidationContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::http::{build_client, post_json, HttpSettings};
use super::secrets::{ApiCredential, CredentialSource};

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Default API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct CountTokensRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    input_tokens: usize,
}

/// Counts tokens with Anthropic's server-side tokenizer.
pub struct AnthropicTokenCounter {
    credential: ApiCredential,
    base_url: String,
    model: String,
    settings: HttpSettings,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for AnthropicTokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicTokenCounter")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicTokenCounter {
    /// # Arguments
    /// * `api_key` - Anthropic API key (stored securely)
    /// * `model` - Model whose tokenizer is used, e.g. "claude-3-5-haiku-latest"
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        let credential =
            ApiCredential::new(api_key, CredentialSource::Programmatic, "Anthropic API key");
        Self::with_credential(credential, model.into(), HttpSettings::default())
    }

    /// Read the key from `ANTHROPIC_API_KEY` and HTTP settings from the
    /// environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, BackendError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Self::with_credential(credential, model.into(), HttpSettings::from_env())
    }

    fn with_credential(
        credential: ApiCredential,
        model: String,
        settings: HttpSettings,
    ) -> Result<Self, BackendError> {
        if model.trim().is_empty() {
            return Err(BackendError::NotConfigured(
                "token_model is required for the anthropic provider".to_string(),
            ));
        }
        Ok(Self {
            credential,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            model,
            client: build_client(&settings)?,
            settings,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn count_messages(
        &self,
        messages: Vec<Value>,
        ctx: &ValidationContext,
    ) -> Result<usize, BackendError> {
        let request = CountTokensRequest {
            model: &self.model,
            messages,
        };

        // Only expose the credential here, at the point of use
        let response: CountTokensResponse = post_json(
            &self.client,
            &self.settings,
            ctx,
            &format!("{}/messages/count_tokens", self.base_url),
            &[
                ("x-api-key", self.credential.expose()),
                ("anthropic-version", ANTHROPIC_VERSION),
            ],
            &request,
        )?;
        Ok(response.input_tokens)
    }
}

/// Messages to send for `content`.
///
/// A structured array of `{role, content}` objects is a conversation and is
/// sent as-is; anything else becomes one user message.
fn messages_for(content: &Content) -> Vec<Value> {
    if let Content::Structured(Value::Array(items)) = content {
        let is_conversation = !items.is_empty()
            && items.iter().all(|item| {
                item.get("role").and_then(Value::as_str).is_some() && item.get("content").is_some()
            });
        if is_conversation {
            return items.clone();
        }
    }
    vec![user_message(&content.as_text())]
}

fn user_message(text: &str) -> Value {
    json!({"role": "user", "content": text})
}

impl TokenCounter for AnthropicTokenCounter {
    fn count(&self, text: &str, ctx: &ValidationContext) -> Result<usize, BackendError> {
        self.count_messages(vec![user_message(text)], ctx)
    }

    fn count_content(
        &self,
        content: &Content,
        ctx: &ValidationContext,
    ) -> Result<usize, BackendError> {
        self.count_messages(messages_for(content), ctx)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Creates [`AnthropicTokenCounter`]s keyed by model.
///
/// The key is read from `ANTHROPIC_API_KEY` when a counter is first created.
#[derive(Debug, Default)]
pub struct AnthropicCounterFactory;

impl TokenCounterFactory for AnthropicCounterFactory {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    fn create(
        &self,
        model: &str,
        _encoding: Option<&str>,
    ) -> Result<Arc<dyn TokenCounter>, BackendError> {
        Ok(Arc::new(AnthropicTokenCounter::from_env(model)?))
    }

    fn cache_key(&self, model: &str, _encoding: Option<&str>) -> String {
        format!("anthropic:{model}")
    }

    fn description(&self) -> &'static str {
        "Anthropic count_tokens endpoint"
    }
}
