//! Local token counting with a Hugging Face `tokenizers` tokenizer.

use aisert_core::{BackendError, TokenCounter, ValidationContext};
use std::path::Path;
use tokenizers::Tokenizer;

/// Counts tokens with a locally loaded tokenizer.
pub struct TokenizerCounter {
    tokenizer: Tokenizer,
    name: String,
}

impl std::fmt::Debug for TokenizerCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizerCounter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TokenizerCounter {
    /// Download (or reuse from the local hub cache) the `tokenizer.json` of
    /// a Hugging Face repository.
    pub fn from_pretrained(repo: &str) -> Result<Self, BackendError> {
        tracing::info!(repo = %repo, "loading tokenizer");
        let tokenizer = Tokenizer::from_pretrained(repo, None).map_err(|e| {
            BackendError::ModelLoad(format!("Tokenizer not found for {repo}: {e}"))
        })?;
        Ok(Self::from_tokenizer(tokenizer, repo))
    }

    /// Load a `tokenizer.json` from disk.
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        tracing::info!(path = %path.display(), "loading tokenizer");
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            BackendError::ModelLoad(format!("Failed to load tokenizer {}: {e}", path.display()))
        })?;
        Ok(Self::from_tokenizer(tokenizer, path.display().to_string()))
    }

    pub fn from_tokenizer(tokenizer: Tokenizer, name: impl Into<String>) -> Self {
        Self {
            tokenizer,
            name: name.into(),
        }
    }
}

impl TokenCounter for TokenizerCounter {
    fn count(&self, text: &str, _ctx: &ValidationContext) -> Result<usize, BackendError> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| BackendError::Inference(format!("Tokenization failed: {e}")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
