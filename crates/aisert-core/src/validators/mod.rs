//! The validator contract and its four implementations.
//!
//! Every validator reads the shared [`Content`] plus a kind-specific input and
//! either returns a [`ValidationResult`] or raises a [`ValidationError`]. The
//! chain controller decides what a raised error means for the session.

mod contains;
mod schema;
mod semantic;
mod token;

pub use contains::{ContainsRule, ContainsValidator};
pub use schema::{Schema, SchemaValidator};
pub use semantic::{SemanticTarget, SemanticValidator, DEFAULT_SEMANTIC_THRESHOLD};
pub use token::{TokenLimit, TokenValidator};

use crate::context::ValidationContext;
use crate::error::ValidationError;
use crate::types::{Content, ValidationResult, ValidatorKind};

/// A single kind of check over validated content.
///
/// Implementations must not leave external state half-updated when they
/// raise. They may log and may lazily create backing resources through the
/// shared model cache.
pub trait Validator: Send + Sync {
    /// Kind-specific arguments (schema descriptor, item list, limit, reference).
    type Input: ?Sized;

    /// Aggregation key for results produced by this validator.
    fn kind(&self) -> ValidatorKind;

    /// Validate `content` against `input`.
    ///
    /// # Arguments
    /// * `content` - The payload under validation
    /// * `input` - Kind-specific arguments
    /// * `ctx` - Deadline and cancellation for backend calls
    fn validate(
        &self,
        content: &Content,
        input: &Self::Input,
        ctx: &ValidationContext,
    ) -> Result<ValidationResult, ValidationError>;
}
