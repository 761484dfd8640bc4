//! OpenAI token counting with local BPE tokenizers.
//!
//! Encodings are resolved from the model name (or an explicit encoding
//! override) and loaded from their Hugging Face ports.

use aisert_core::{BackendError, TokenCounter, TokenCounterFactory};
use std::sync::Arc;

use super::tokenizer::TokenizerCounter;

/// Known encodings and the Hugging Face repositories carrying their tokenizers.
const ENCODINGS: [(&str, &str); 4] = [
    ("o200k_base", "Xenova/gpt-4o"),
    ("cl100k_base", "Xenova/gpt-4"),
    ("p50k_base", "Xenova/text-davinci-003"),
    ("r50k_base", "Xenova/gpt2"),
];

/// Model-name prefixes per encoding. Longer prefixes come first.
const MODEL_PREFIXES: [(&str, &str); 14] = [
    ("gpt-4o", "o200k_base"),
    ("gpt-4.1", "o200k_base"),
    ("gpt-4.5", "o200k_base"),
    ("chatgpt-4o", "o200k_base"),
    ("o1", "o200k_base"),
    ("o3", "o200k_base"),
    ("o4", "o200k_base"),
    ("gpt-4", "cl100k_base"),
    ("gpt-3.5", "cl100k_base"),
    ("text-embedding-3", "cl100k_base"),
    ("text-embedding-ada-002", "cl100k_base"),
    ("text-davinci-00", "p50k_base"),
    ("code-davinci", "p50k_base"),
    ("davinci", "r50k_base"),
];

/// Encoding used by an OpenAI model, if known.
pub fn encoding_for_model(model: &str) -> Option<&'static str> {
    MODEL_PREFIXES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, encoding)| *encoding)
}

/// Tokenizer repository for an encoding name.
pub fn tokenizer_repo(encoding: &str) -> Option<&'static str> {
    ENCODINGS
        .iter()
        .find(|(name, _)| *name == encoding)
        .map(|(_, repo)| *repo)
}

/// Pick the encoding: a valid override wins, otherwise the model decides.
///
/// An unknown override is logged and ignored.
pub fn resolve_encoding(model: &str, encoding: Option<&str>) -> Result<&'static str, BackendError> {
    if let Some(requested) = encoding {
        match ENCODINGS.iter().find(|(name, _)| *name == requested) {
            Some((name, _)) => return Ok(*name),
            None => tracing::warn!(
                encoding = %requested,
                model = %model,
                "unknown encoding, falling back to the model's encoding"
            ),
        }
    }

    if model.trim().is_empty() {
        return Err(BackendError::NotConfigured(
            "token_model or token_encoding is required for the openai provider".to_string(),
        ));
    }

    encoding_for_model(model).ok_or_else(|| {
        BackendError::UnsupportedModel(format!(
            "no known encoding for OpenAI model '{model}'; set token_encoding to one of {:?}",
            ENCODINGS.map(|(name, _)| name)
        ))
    })
}

/// Creates OpenAI counters, one per encoding.
#[derive(Debug, Default)]
pub struct OpenAiCounterFactory;

impl TokenCounterFactory for OpenAiCounterFactory {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn create(
        &self,
        model: &str,
        encoding: Option<&str>,
    ) -> Result<Arc<dyn TokenCounter>, BackendError> {
        let encoding = resolve_encoding(model, encoding)?;
        let repo = tokenizer_repo(encoding).ok_or_else(|| {
            BackendError::UnsupportedModel(format!("no tokenizer for encoding '{encoding}'"))
        })?;
        Ok(Arc::new(TokenizerCounter::from_pretrained(repo)?))
    }

    fn cache_key(&self, model: &str, encoding: Option<&str>) -> String {
        match resolve_encoding(model, encoding) {
            Ok(encoding) => format!("openai:{encoding}"),
            Err(_) => format!("openai:{model}"),
        }
    }

    fn description(&self) -> &'static str {
        "OpenAI BPE encodings via local tokenizers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_for_model() {
        assert_eq!(encoding_for_model("gpt-4o-mini"), Some("o200k_base"));
        assert_eq!(encoding_for_model("gpt-4-turbo"), Some("cl100k_base"));
        assert_eq!(encoding_for_model("gpt-3.5-turbo"), Some("cl100k_base"));
        assert_eq!(encoding_for_model("o3-mini"), Some("o200k_base"));
        assert_eq!(encoding_for_model("text-davinci-003"), Some("p50k_base"));
        assert_eq!(encoding_for_model("davinci"), Some("r50k_base"));
        assert_eq!(encoding_for_model("llama-3"), None);
    }

    #[test]
    fn test_override_wins() {
        assert_eq!(
            resolve_encoding("gpt-3.5-turbo", Some("o200k_base")).unwrap(),
            "o200k_base"
        );
        assert_eq!(resolve_encoding("", Some("r50k_base")).unwrap(), "r50k_base");
    }

    #[test]
    fn test_unknown_override_falls_back_to_model() {
        assert_eq!(
            resolve_encoding("gpt-4o", Some("made_up")).unwrap(),
            "o200k_base"
        );
    }

    #[test]
    fn test_missing_model_and_encoding() {
        let err = resolve_encoding("", None).unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured(_)));
    }

    #[test]
    fn test_unknown_model() {
        let err = resolve_encoding("mistral-large", None).unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedModel(_)));
        assert!(err.is_misuse());
    }

    #[test]
    fn test_cache_key_shares_encodings() {
        let factory = OpenAiCounterFactory;
        assert_eq!(factory.cache_key("gpt-4", None), "openai:cl100k_base");
        assert_eq!(factory.cache_key("gpt-3.5-turbo", None), "openai:cl100k_base");
        assert_eq!(factory.cache_key("gpt-4o", None), "openai:o200k_base");
    }

    #[test]
    fn test_every_encoding_has_a_repo() {
        for (_, encoding) in MODEL_PREFIXES {
            assert!(tokenizer_repo(encoding).is_some());
        }
    }
}
