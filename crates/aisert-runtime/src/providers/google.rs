//! Google Gemini token counting through the `models/{model}:countTokens`
//! endpoint.

use aisert_core::{BackendError, TokenCounter, TokenCounterFactory, ValidationContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::http::{build_client, post_json, HttpSettings};
use super::secrets::{ApiCredential, CredentialSource};

/// Environment variables checked, in order, for the API key.
pub const GOOGLE_API_KEY_ENVS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Default API base URL.
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct CountTokensRequest<'a> {
    contents: [GoogleContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct GoogleContent<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: usize,
}

/// Counts tokens with Gemini's server-side tokenizer.
pub struct GoogleTokenCounter {
    credential: ApiCredential,
    base_url: String,
    model: String,
    settings: HttpSettings,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for GoogleTokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTokenCounter")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GoogleTokenCounter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        let credential =
            ApiCredential::new(api_key, CredentialSource::Programmatic, "Google API key");
        Self::with_credential(credential, model.into(), HttpSettings::default())
    }

    /// Read the key from `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and HTTP
    /// settings from the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, BackendError> {
        let credential = ApiCredential::from_env_any(&GOOGLE_API_KEY_ENVS, "Google API key")?;
        Self::with_credential(credential, model.into(), HttpSettings::from_env())
    }

    fn with_credential(
        credential: ApiCredential,
        model: String,
        settings: HttpSettings,
    ) -> Result<Self, BackendError> {
        let model = model.trim().trim_start_matches("models/").to_string();
        if model.is_empty() {
            return Err(BackendError::NotConfigured(
                "token_model is required for the google provider".to_string(),
            ));
        }
        Ok(Self {
            credential,
            base_url: GOOGLE_BASE_URL.to_string(),
            model,
            client: build_client(&settings)?,
            settings,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:countTokens", self.base_url, self.model)
    }
}

impl TokenCounter for GoogleTokenCounter {
    fn count(&self, text: &str, ctx: &ValidationContext) -> Result<usize, BackendError> {
        let request = CountTokensRequest {
            contents: [GoogleContent {
                role: "user",
                parts: [Part { text }],
            }],
        };

        let response: CountTokensResponse = post_json(
            &self.client,
            &self.settings,
            ctx,
            &self.endpoint(),
            &[("x-goog-api-key", self.credential.expose())],
            &request,
        )?;
        Ok(response.total_tokens)
    }

    fn name(&self) -> &str {
        "google"
    }
}

/// Creates [`GoogleTokenCounter`]s keyed by model.
#[derive(Debug, Default)]
pub struct GoogleCounterFactory;

impl TokenCounterFactory for GoogleCounterFactory {
    fn provider(&self) -> &'static str {
        "google"
    }

    fn create(
        &self,
        model: &str,
        _encoding: Option<&str>,
    ) -> Result<Arc<dyn TokenCounter>, BackendError> {
        Ok(Arc::new(GoogleTokenCounter::from_env(model)?))
    }

    fn cache_key(&self, model: &str, _encoding: Option<&str>) -> String {
        format!("google:{model}")
    }

    fn description(&self) -> &'static str {
        "Gemini countTokens endpoint"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = CountTokensRequest {
            contents: [GoogleContent {
                role: "user",
                parts: [Part { text: "Hello" }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"contents": [{"role": "user", "parts": [{"text": "Hello"}]}]})
        );
    }

    #[test]
    fn test_response_parsing() {
        let response: CountTokensResponse =
            serde_json::from_value(json!({"totalTokens": 12, "promptTokensDetails": []})).unwrap();
        assert_eq!(response.total_tokens, 12);
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        let counter = GoogleTokenCounter::new("key", "models/gemini-1.5-flash").unwrap();
        assert_eq!(
            counter.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:countTokens"
        );
    }

    #[test]
    fn test_missing_model_is_not_configured() {
        assert!(GoogleTokenCounter::new("key", "  ").unwrap_err().is_misuse());
    }
}
