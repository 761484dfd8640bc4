//! # aisert-core
//!
//! Fluent validation chains for language-model output.
//!
//! One [`Aisert`] session checks one response against any mix of:
//! - structural conformance (JSON Schema or a typed model)
//! - required and forbidden substrings
//! - a token budget for the configured model
//! - semantic similarity to a reference text
//!
//! Each check records its latest outcome per validator kind. Strict calls
//! stop the chain on the first failure; non-strict calls keep going so the
//! whole picture lands in the final [`AisertReport`].
//!
//! ## Key Guarantees
//!
//! 1. **No inference here**: token counting and embeddings go through the
//!    [`TokenCounter`] and [`Embedder`] traits
//! 2. **One instance per model**: backends are cached process-wide and
//!    created at most once per key, even under concurrent first use
//! 3. **Vacuous pass**: a session with no checks collects as passed
//!
//! ## Example
//!
//! ```rust,ignore
//! use aisert_core::{Aisert, Schema};
//!
//! let mut aisert = Aisert::new(response).with_backends(aisert_runtime::registry());
//! let report = aisert
//!     .assert_schema(Schema::of::<Answer>(), false)?
//!     .assert_contains(["refund"], false)?
//!     .assert_not_contains(["password"], false)?
//!     .assert_tokens(200, false)?
//!     .assert_semantic_matches("The refund was approved.", false)?
//!     .collect();
//!
//! println!("{report}");
//! ```

pub mod backend;
pub mod cache;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod plan;
pub mod report;
pub mod sanitize;
pub mod similarity;
pub mod status;
pub mod types;
pub mod validators;

// Re-export main types at crate root
pub use backend::{
    BackendError, BackendRegistry, Embedder, EmbedderFactory, TokenCounter, TokenCounterFactory,
};
pub use cache::ModelInstanceCache;
pub use chain::Aisert;
pub use config::{AisertConfig, ConfigError, ConfigSource, DEFAULT_SENTENCE_TRANSFORMER_MODEL};
pub use context::{CancellationFlag, ValidationContext};
pub use error::{AisertError, ErrorClass, ValidationError};
pub use plan::{Plan, PlanError, Step};
pub use report::AisertReport;
pub use similarity::cosine_similarity;
pub use status::AisertStatus;
pub use types::{Content, ValidationResult, ValidatorKind};
pub use validators::{
    ContainsRule, ContainsValidator, Schema, SchemaValidator, SemanticTarget, SemanticValidator,
    TokenLimit, TokenValidator, Validator, DEFAULT_SEMANTIC_THRESHOLD,
};
