//! # aisert-runtime
//!
//! Concrete model backends for `aisert-core`.
//!
//! `aisert-core` never counts tokens or computes embeddings itself; it asks a
//! [`BackendRegistry`] for them. This crate fills that registry with the
//! backends compiled in through cargo features (see [`providers`]) and runs
//! validation plans over whole batches of responses.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aisert_core::{Aisert, AisertConfig};
//!
//! let config = AisertConfig::new("openai", "gpt-4o");
//! let report = Aisert::with_config(response, config)
//!     .with_backends(aisert_runtime::registry())
//!     .assert_tokens(500, false)?
//!     .assert_semantic_matches("The order has shipped.", false)?
//!     .collect();
//! ```

use aisert_core::BackendRegistry;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

pub mod batch;
pub mod providers;

pub use batch::{BatchRunner, DEFAULT_CONCURRENCY};

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("validation task {index} failed: {source}")]
    Join {
        index: usize,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Register every backend compiled into this build.
pub fn register_defaults(registry: &mut BackendRegistry) {
    #[cfg(feature = "openai")]
    registry.register_counter(Arc::new(providers::OpenAiCounterFactory));

    #[cfg(feature = "huggingface")]
    registry.register_counter(Arc::new(providers::HuggingFaceCounterFactory));

    #[cfg(feature = "anthropic")]
    registry.register_counter(Arc::new(providers::AnthropicCounterFactory));

    #[cfg(feature = "google")]
    registry.register_counter(Arc::new(providers::GoogleCounterFactory));

    #[cfg(feature = "local-embeddings")]
    registry.register_embedder(Arc::new(providers::FastEmbedFactory));

    tracing::debug!(
        providers = ?registry.available_providers(),
        embeddings = registry.has_embedder(),
        "registered default backends"
    );
}

/// The process-wide registry with every compiled-in backend.
pub fn registry() -> Arc<BackendRegistry> {
    static REGISTRY: OnceLock<Arc<BackendRegistry>> = OnceLock::new();
    Arc::clone(REGISTRY.get_or_init(|| {
        let mut registry = BackendRegistry::new();
        register_defaults(&mut registry);
        Arc::new(registry)
    }))
}
