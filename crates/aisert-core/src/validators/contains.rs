//! Required and forbidden substrings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Validator;
use crate::context::ValidationContext;
use crate::error::{ErrorClass, ValidationError};
use crate::types::{Content, ValidationResult, ValidatorKind};

/// An ordered item list plus the direction of the check.
///
/// With `invert == false` every item must occur in the content. With
/// `invert == true` none may occur.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContainsRule {
    pub items: Vec<String>,
    #[serde(default)]
    pub invert: bool,
}

impl ContainsRule {
    pub fn required<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            invert: false,
        }
    }

    pub fn forbidden<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            invert: true,
            ..Self::required(items)
        }
    }

    /// Build a rule from untyped input, e.g. a value read from a plan file.
    ///
    /// `items` must be an array of strings.
    pub fn from_value(items: &Value, invert: bool) -> Result<Self, ValidationError> {
        let Value::Array(values) = items else {
            return Err(ValidationError::contains(
                ErrorClass::InvalidInput,
                format!("items must be a list, got {}", json_type(items)),
            ));
        };

        let items = values
            .iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::String(item) => Ok(item.clone()),
                other => Err(ValidationError::contains(
                    ErrorClass::InvalidInput,
                    format!("items[{index}] must be a string, got {}", json_type(other)),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { items, invert })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Substring search over the textual view of the content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsValidator;

impl ContainsValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for ContainsValidator {
    type Input = ContainsRule;

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Contains
    }

    fn validate(
        &self,
        content: &Content,
        rule: &ContainsRule,
        _ctx: &ValidationContext,
    ) -> Result<ValidationResult, ValidationError> {
        let text = content.as_text();
        let (found, missing): (Vec<&String>, Vec<&String>) = rule
            .items
            .iter()
            .partition(|item| text.contains(item.as_str()));

        tracing::debug!(
            invert = rule.invert,
            found = found.len(),
            missing = missing.len(),
            "checked items"
        );

        let result = if rule.invert {
            if found.is_empty() {
                ValidationResult::pass("No flagged items found")
            } else {
                ValidationResult::fail(format!("Found flagged items: {found:?}"))
            }
        } else if missing.is_empty() {
            ValidationResult::pass(format!("Found all items: {found:?}"))
        } else {
            ValidationResult::fail(format!("Missing items: {missing:?}"))
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(content: &str, rule: ContainsRule) -> ValidationResult {
        ContainsValidator::new()
            .validate(&content.into(), &rule, &ValidationContext::unbounded())
            .unwrap()
    }

    #[test]
    fn test_all_required_items_present() {
        let result = check("Hello world", ContainsRule::required(["Hello", "world"]));
        assert!(result.status());
        assert_eq!(result.reason(), r#"Found all items: ["Hello", "world"]"#);
    }

    #[test]
    fn test_missing_items_are_named() {
        let result = check("Hello world", ContainsRule::required(["Hello", "missing"]));
        assert!(!result.status());
        assert_eq!(result.reason(), r#"Missing items: ["missing"]"#);
    }

    #[test]
    fn test_empty_requirement_is_vacuous() {
        let result = check("Hello world", ContainsRule::required(Vec::<String>::new()));
        assert!(result.status());

        let result = check("Hello world", ContainsRule::forbidden(Vec::<String>::new()));
        assert!(result.status());
    }

    #[test]
    fn test_forbidden_items() {
        let clean = check("Hello world", ContainsRule::forbidden(["spam"]));
        assert!(clean.status());
        assert_eq!(clean.reason(), "No flagged items found");

        let flagged = check("Hello world", ContainsRule::forbidden(["Hello", "spam"]));
        assert!(!flagged.status());
        assert_eq!(flagged.reason(), r#"Found flagged items: ["Hello"]"#);
    }

    #[test]
    fn test_search_is_case_sensitive() {
        let result = check("Hello world", ContainsRule::required(["hello"]));
        assert!(!result.status());
    }

    #[test]
    fn test_structured_content_searches_json_text() {
        let content = Content::from(json!({"status": "ok"}));
        let result = ContainsValidator::new()
            .validate(
                &content,
                &ContainsRule::required(["\"status\"", "ok"]),
                &ValidationContext::unbounded(),
            )
            .unwrap();
        assert!(result.status());
    }

    #[test]
    fn test_from_value_rejects_non_list() {
        let err = ContainsRule::from_value(&json!("Hello"), false).unwrap_err();
        assert_eq!(err.kind(), ValidatorKind::Contains);
        assert!(err.is_misuse());
        assert!(err.message().contains("string"));
    }

    #[test]
    fn test_from_value_rejects_non_string_item() {
        let err = ContainsRule::from_value(&json!(["a", 1]), true).unwrap_err();
        assert_eq!(err.message(), "items[1] must be a string, got number");
    }

    #[test]
    fn test_from_value_accepts_strings() {
        let rule = ContainsRule::from_value(&json!(["a", "b"]), true).unwrap();
        assert_eq!(rule, ContainsRule::forbidden(["a", "b"]));
    }
}
