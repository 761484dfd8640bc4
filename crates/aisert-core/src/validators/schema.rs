//! Structural conformance against a JSON Schema document or a typed model.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use super::Validator;
use crate::context::ValidationContext;
use crate::error::{ErrorClass, ValidationError};
use crate::types::{Content, ValidationResult, ValidatorKind};

type TypedCheck = fn(&Value) -> Result<(), String>;

/// What the content must conform to.
#[derive(Clone)]
pub enum Schema {
    /// A JSON Schema document, compiled on each validation.
    Json(Value),

    /// A Rust type the content must deserialize into.
    Typed {
        type_name: &'static str,
        check: TypedCheck,
    },
}

impl Schema {
    pub fn json(document: Value) -> Self {
        Schema::Json(document)
    }

    /// Conformance means `serde` can deserialize the content into `T`.
    pub fn of<T: DeserializeOwned>() -> Self {
        Schema::Typed {
            type_name: std::any::type_name::<T>(),
            check: deserializes_as::<T>,
        }
    }

    /// Short description for logs and reasons.
    pub fn describe(&self) -> Cow<'_, str> {
        match self {
            Schema::Json(document) => match document.get("title").and_then(Value::as_str) {
                Some(title) => Cow::Owned(format!("JSON Schema '{title}'")),
                None => Cow::Borrowed("JSON Schema"),
            },
            Schema::Typed { type_name, .. } => Cow::Borrowed(type_name),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Json(document) => f.debug_tuple("Json").field(document).finish(),
            Schema::Typed { type_name, .. } => f
                .debug_struct("Typed")
                .field("type_name", type_name)
                .finish_non_exhaustive(),
        }
    }
}

impl From<Value> for Schema {
    fn from(document: Value) -> Self {
        Schema::Json(document)
    }
}

fn deserializes_as<T: DeserializeOwned>(value: &Value) -> Result<(), String> {
    T::deserialize(value).map(|_| ()).map_err(|e| e.to_string())
}

/// Checks content shape against a [`Schema`].
///
/// Text content is parsed as JSON first; structured content is used as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    fn parse(content: &Content) -> Result<Cow<'_, Value>, ValidationError> {
        match content {
            Content::Structured(value) => Ok(Cow::Borrowed(value)),
            Content::Text(text) => serde_json::from_str(text).map(Cow::Owned).map_err(|e| {
                ValidationError::schema(
                    ErrorClass::Unsatisfied,
                    format!("Content is not valid JSON: {e}"),
                )
            }),
        }
    }
}

impl Validator for SchemaValidator {
    type Input = Schema;

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Schema
    }

    fn validate(
        &self,
        content: &Content,
        schema: &Schema,
        _ctx: &ValidationContext,
    ) -> Result<ValidationResult, ValidationError> {
        tracing::debug!(schema = %schema.describe(), "validating content against schema");
        let instance = Self::parse(content)?;

        match schema {
            Schema::Json(document) => {
                let compiled = jsonschema::options().build(document).map_err(|e| {
                    ValidationError::schema(
                        ErrorClass::InvalidInput,
                        format!("Provided schema is not a valid JSON Schema: {e}"),
                    )
                })?;

                let violations: Vec<String> = compiled
                    .iter_errors(&instance)
                    .map(|e| format!("{} at '{}'", e, e.instance_path))
                    .collect();

                if !violations.is_empty() {
                    return Err(ValidationError::schema(
                        ErrorClass::Unsatisfied,
                        format!(
                            "Content does not match {}: {}",
                            schema.describe(),
                            violations.join("; ")
                        ),
                    ));
                }
            }
            Schema::Typed { type_name, check } => {
                check(&instance).map_err(|e| {
                    ValidationError::schema(
                        ErrorClass::Unsatisfied,
                        format!("Content does not match {type_name}: {e}"),
                    )
                })?;
            }
        }

        Ok(ValidationResult::pass(format!(
            "Content matches {}",
            schema.describe()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Answer {
        text: String,
        confidence: f64,
    }

    fn person_schema() -> Schema {
        Schema::json(json!({
            "title": "Person",
            "type": "object",
            "required": ["name", "age"],
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            }
        }))
    }

    fn run(content: impl Into<Content>, schema: &Schema) -> Result<ValidationResult, ValidationError> {
        SchemaValidator::new().validate(&content.into(), schema, &ValidationContext::unbounded())
    }

    #[test]
    fn test_text_content_matching_schema_passes() {
        let result = run(r#"{"name": "Ada", "age": 36}"#, &person_schema()).unwrap();
        assert!(result.status());
        assert_eq!(result.reason(), "Content matches JSON Schema 'Person'");
    }

    #[test]
    fn test_structured_content_is_used_directly() {
        let result = run(json!({"name": "Ada", "age": 36}), &person_schema()).unwrap();
        assert!(result.status());
    }

    #[test]
    fn test_unparseable_text_is_unsatisfied() {
        let err = run("not json at all", &person_schema()).unwrap_err();
        assert_eq!(err.kind(), ValidatorKind::Schema);
        assert_eq!(err.class(), ErrorClass::Unsatisfied);
        assert!(err.message().starts_with("Content is not valid JSON"));
    }

    #[test]
    fn test_mismatch_lists_every_violation_with_path() {
        let err = run(json!({"name": 7, "age": -1}), &person_schema()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Unsatisfied);
        assert!(err.message().contains("'/name'"));
        assert!(err.message().contains("'/age'"));
    }

    #[test]
    fn test_invalid_schema_is_misuse() {
        let schema = Schema::json(json!({"type": "no-such-type"}));
        let err = run(json!({}), &schema).unwrap_err();
        assert!(err.is_misuse());
    }

    #[test]
    fn test_typed_schema() {
        let schema = Schema::of::<Answer>();
        assert!(run(r#"{"text": "yes", "confidence": 0.9}"#, &schema)
            .unwrap()
            .status());

        let err = run(r#"{"text": "yes"}"#, &schema).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Unsatisfied);
        assert!(err.message().contains("confidence"));
    }
}
