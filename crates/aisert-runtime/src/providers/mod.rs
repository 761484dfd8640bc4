//! Token-counting and embedding backends.
//!
//! Every backend sits behind a cargo feature:
//!
//! | provider      | feature            | counts with                          |
//! |---------------|--------------------|--------------------------------------|
//! | `openai`      | `openai`           | local BPE tokenizers                 |
//! | `huggingface` | `huggingface`      | any hub or on-disk `tokenizer.json`  |
//! | `anthropic`   | `anthropic`        | `messages/count_tokens` API          |
//! | `google`      | `google`           | `models/{model}:countTokens` API     |
//! | embeddings    | `local-embeddings` | fastembed ONNX models                |
//!
//! ## Security
//!
//! API keys for the HTTP providers are handled by the [`secrets`] module.

pub mod http;
pub mod secrets;

#[cfg(any(feature = "openai", feature = "huggingface"))]
mod tokenizer;

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "huggingface")]
mod huggingface;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "google")]
mod google;

#[cfg(feature = "local-embeddings")]
mod embeddings;

pub use http::{HttpSettings, HTTP_RETRIES_ENV, HTTP_TIMEOUT_ENV};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(any(feature = "openai", feature = "huggingface"))]
pub use tokenizer::TokenizerCounter;

#[cfg(feature = "openai")]
pub use openai::{encoding_for_model, resolve_encoding, tokenizer_repo, OpenAiCounterFactory};

#[cfg(feature = "huggingface")]
pub use huggingface::HuggingFaceCounterFactory;

#[cfg(feature = "anthropic")]
pub use anthropic::{
    AnthropicCounterFactory, AnthropicTokenCounter, ANTHROPIC_API_KEY_ENV, ANTHROPIC_BASE_URL,
};

#[cfg(feature = "google")]
pub use google::{GoogleCounterFactory, GoogleTokenCounter, GOOGLE_API_KEY_ENVS, GOOGLE_BASE_URL};

#[cfg(feature = "local-embeddings")]
pub use embeddings::{embedding_model, supported_models, FastEmbedFactory, FastEmbedder};
