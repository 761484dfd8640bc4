//! Token counting with any Hugging Face tokenizer.
//!
//! The model is either a hub repository id (`bert-base-uncased`,
//! `meta-llama/Llama-3.2-1B`) or a path to a local `tokenizer.json`.

use aisert_core::{BackendError, TokenCounter, TokenCounterFactory};
use std::path::Path;
use std::sync::Arc;

use super::tokenizer::TokenizerCounter;

#[derive(Debug, Default)]
pub struct HuggingFaceCounterFactory;

impl TokenCounterFactory for HuggingFaceCounterFactory {
    fn provider(&self) -> &'static str {
        "huggingface"
    }

    fn create(
        &self,
        model: &str,
        _encoding: Option<&str>,
    ) -> Result<Arc<dyn TokenCounter>, BackendError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(BackendError::NotConfigured(
                "token_model is required for the huggingface provider".to_string(),
            ));
        }

        let path = Path::new(model);
        let counter = if path.is_file() {
            TokenizerCounter::from_file(path)?
        } else {
            TokenizerCounter::from_pretrained(model)?
        };
        Ok(Arc::new(counter))
    }

    fn cache_key(&self, model: &str, _encoding: Option<&str>) -> String {
        format!("huggingface:{}", model.trim())
    }

    fn description(&self) -> &'static str {
        "Hugging Face tokenizers (hub id or local tokenizer.json)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_not_configured() {
        let err = HuggingFaceCounterFactory.create("   ", None).unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured(_)));
    }

    #[test]
    fn test_cache_key_ignores_encoding() {
        assert_eq!(
            HuggingFaceCounterFactory.cache_key("bert-base-uncased", Some("cl100k_base")),
            "huggingface:bert-base-uncased"
        );
    }
}
