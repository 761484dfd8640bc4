//! Per-session accumulation of validator outcomes.
//!
//! One slot per [`ValidatorKind`], all unset at creation. Writing a slot
//! overwrites it; nothing accumulates across calls for the same kind.

use crate::sanitize::sanitize_for_log;
use crate::types::{ValidationResult, ValidatorKind};

/// Latest result per validator kind for one chain session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AisertStatus {
    slots: [Option<ValidationResult>; 4],
}

impl AisertStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `result` for `kind`, replacing any earlier result.
    pub fn update(&mut self, kind: ValidatorKind, result: ValidationResult) {
        self.slots[kind.index()] = Some(result);
    }

    /// Record by string tag.
    ///
    /// An unrecognised tag is ignored with a warning so that callers built
    /// against a different validator set keep working. Returns whether the
    /// slot was written.
    pub fn update_by_name(&mut self, name: &str, result: ValidationResult) -> bool {
        match ValidatorKind::from_name(name) {
            Some(kind) => {
                self.update(kind, result);
                true
            }
            None => {
                tracing::warn!(
                    validator = %sanitize_for_log(name),
                    "ignoring result for unknown validator"
                );
                false
            }
        }
    }

    pub fn get(&self, kind: ValidatorKind) -> Option<&ValidationResult> {
        self.slots[kind.index()].as_ref()
    }

    /// Set slots only, in [`ValidatorKind::ALL`] order.
    pub fn collect(&self) -> Vec<(ValidatorKind, &ValidationResult)> {
        ValidatorKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|result| (kind, result)))
            .collect()
    }

    /// Logical AND over recorded statuses; true when nothing is recorded.
    pub fn all_passed(&self) -> bool {
        self.slots.iter().flatten().all(ValidationResult::status)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status_is_empty() {
        let status = AisertStatus::new();
        assert!(status.collect().is_empty());
        assert!(status.all_passed());
    }

    #[test]
    fn test_update_overwrites() {
        let mut status = AisertStatus::new();
        status.update(ValidatorKind::Contains, ValidationResult::fail("first"));
        status.update(ValidatorKind::Contains, ValidationResult::pass("second"));

        let collected = status.collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].1.reason(), "second");
        assert!(status.all_passed());
    }

    #[test]
    fn test_collect_follows_kind_order() {
        let mut status = AisertStatus::new();
        status.update(ValidatorKind::Semantic, ValidationResult::pass("s"));
        status.update(ValidatorKind::Schema, ValidationResult::pass("a"));
        status.update(ValidatorKind::Token, ValidationResult::fail("t"));

        let kinds: Vec<_> = status.collect().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                ValidatorKind::Schema,
                ValidatorKind::Token,
                ValidatorKind::Semantic
            ]
        );
        assert!(!status.all_passed());
    }

    #[test]
    fn test_update_by_unknown_name_is_noop() {
        let mut status = AisertStatus::new();
        assert!(!status.update_by_name("RegexValidator", ValidationResult::pass("x")));
        assert!(status.is_empty());

        assert!(status.update_by_name("TokenValidator", ValidationResult::pass("ok")));
        assert_eq!(status.get(ValidatorKind::Token).unwrap().reason(), "ok");
    }

    #[test]
    fn test_clear() {
        let mut status = AisertStatus::new();
        status.update(ValidatorKind::Schema, ValidationResult::fail("x"));
        status.clear();
        assert!(status.is_empty());
    }
}
