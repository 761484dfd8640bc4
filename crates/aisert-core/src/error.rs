//! Error types raised by validators and by the chain controller.

use std::fmt;
use thiserror::Error;

use crate::types::ValidatorKind;

/// Why a validator raised instead of returning a [`ValidationResult`](crate::ValidationResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The call itself was malformed (bad schema, bad threshold, wrong item shape).
    InvalidInput,

    /// The content was rejected (unparseable, shape mismatch, over budget).
    Unsatisfied,

    /// The counting or embedding service failed.
    Backend,

    /// The deadline passed or the call was cancelled.
    Interrupted,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::InvalidInput => write!(f, "invalid input"),
            ErrorClass::Unsatisfied => write!(f, "unsatisfied"),
            ErrorClass::Backend => write!(f, "backend failure"),
            ErrorClass::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Errors raised by validators.
///
/// One variant per validator kind. Under non-strict chaining every variant
/// degrades to a failing result regardless of its class.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("SchemaValidationError ({class}): {message}")]
    Schema { class: ErrorClass, message: String },

    #[error("ContainsValidationError ({class}): {message}")]
    Contains { class: ErrorClass, message: String },

    #[error("SemanticValidationError ({class}): {message}")]
    Semantic { class: ErrorClass, message: String },

    #[error("TokenValidationError ({class}) for model '{model}': {message}")]
    Token {
        class: ErrorClass,
        model: String,
        message: String,
    },
}

impl ValidationError {
    pub fn schema(class: ErrorClass, message: impl Into<String>) -> Self {
        Self::Schema {
            class,
            message: message.into(),
        }
    }

    pub fn contains(class: ErrorClass, message: impl Into<String>) -> Self {
        Self::Contains {
            class,
            message: message.into(),
        }
    }

    pub fn semantic(class: ErrorClass, message: impl Into<String>) -> Self {
        Self::Semantic {
            class,
            message: message.into(),
        }
    }

    pub fn token(class: ErrorClass, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Token {
            class,
            model: model.into(),
            message: message.into(),
        }
    }

    /// Build the error for `kind`. Token errors get an empty model.
    pub fn for_kind(kind: ValidatorKind, class: ErrorClass, message: impl Into<String>) -> Self {
        match kind {
            ValidatorKind::Schema => Self::schema(class, message),
            ValidatorKind::Contains => Self::contains(class, message),
            ValidatorKind::Semantic => Self::semantic(class, message),
            ValidatorKind::Token => Self::token(class, "", message),
        }
    }

    /// The validator that raised this error.
    pub fn kind(&self) -> ValidatorKind {
        match self {
            Self::Schema { .. } => ValidatorKind::Schema,
            Self::Contains { .. } => ValidatorKind::Contains,
            Self::Semantic { .. } => ValidatorKind::Semantic,
            Self::Token { .. } => ValidatorKind::Token,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Schema { class, .. }
            | Self::Contains { class, .. }
            | Self::Semantic { class, .. }
            | Self::Token { class, .. } => *class,
        }
    }

    /// The bare message, without the kind/class prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Schema { message, .. }
            | Self::Contains { message, .. }
            | Self::Semantic { message, .. }
            | Self::Token { message, .. } => message,
        }
    }

    /// Model identifier for token errors.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Token { model, .. } if !model.is_empty() => Some(model),
            _ => None,
        }
    }

    /// True when the caller misused the validator rather than the content failing.
    pub fn is_misuse(&self) -> bool {
        self.class() == ErrorClass::InvalidInput
    }
}

/// Errors surfaced by strict chain calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AisertError {
    /// A validator raised.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A validator returned a failing result.
    #[error("{validator} failed: {reason}")]
    Rejected {
        validator: ValidatorKind,
        reason: String,
    },
}

impl AisertError {
    pub fn kind(&self) -> ValidatorKind {
        match self {
            Self::Validation(error) => error.kind(),
            Self::Rejected { validator, .. } => *validator,
        }
    }

    /// Human-readable reason, as recorded in the status aggregator.
    pub fn reason(&self) -> &str {
        match self {
            Self::Validation(error) => error.message(),
            Self::Rejected { reason, .. } => reason,
        }
    }
}
