//! Terminal summary of a validation session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::status::AisertStatus;
use crate::types::{ValidationResult, ValidatorKind};

/// Overall pass/fail plus the result of every validator that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AisertReport {
    /// Logical AND over `rules`; true when no validator ran.
    pub status: bool,

    /// Per-validator results, keyed by validator tag.
    pub rules: BTreeMap<ValidatorKind, ValidationResult>,

    /// When the report was collected.
    pub collected_at: DateTime<Utc>,
}

impl AisertReport {
    /// Reduce a status snapshot into a report.
    pub fn from_status(status: &AisertStatus) -> Self {
        let rules: BTreeMap<ValidatorKind, ValidationResult> = status
            .collect()
            .into_iter()
            .map(|(kind, result)| (kind, result.clone()))
            .collect();

        Self {
            status: rules.values().all(ValidationResult::status),
            rules,
            collected_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status
    }

    /// Look up a rule by validator tag, e.g. `"ContainsValidator"`.
    pub fn rule(&self, name: &str) -> Option<&ValidationResult> {
        ValidatorKind::from_name(name).and_then(|kind| self.rules.get(&kind))
    }

    /// Failing rules, in reporting order.
    pub fn failures(&self) -> Vec<(ValidatorKind, &ValidationResult)> {
        self.rules
            .iter()
            .filter(|(_, result)| !result.status())
            .map(|(kind, result)| (*kind, result))
            .collect()
    }

    /// `{status, rules: {tag: {status, reason}}}`.
    pub fn to_json(&self) -> Value {
        let rules: serde_json::Map<String, Value> = self
            .rules
            .iter()
            .map(|(kind, result)| (kind.name().to_string(), result.to_value()))
            .collect();

        serde_json::json!({
            "status": self.status,
            "rules": rules,
        })
    }
}

impl fmt::Display for AisertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} of {} rules passed)",
            if self.status { "PASSED" } else { "FAILED" },
            self.rules.len() - self.failures().len(),
            self.rules.len()
        )?;
        for (kind, result) in &self.rules {
            writeln!(
                f,
                "  [{}] {}: {}",
                if result.status() { "PASS" } else { "FAIL" },
                kind,
                result.reason()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status_with(entries: &[(ValidatorKind, bool, &str)]) -> AisertStatus {
        let mut status = AisertStatus::new();
        for (kind, passed, reason) in entries {
            status.update(*kind, ValidationResult::new(*passed, *reason));
        }
        status
    }

    #[test]
    fn test_empty_report_passes_vacuously() {
        let report = AisertReport::from_status(&AisertStatus::new());
        assert!(report.status);
        assert!(report.rules.is_empty());
        assert_eq!(report.to_json(), json!({"status": true, "rules": {}}));
    }

    #[test]
    fn test_status_is_and_of_rules() {
        let report = AisertReport::from_status(&status_with(&[
            (ValidatorKind::Schema, true, "ok"),
            (ValidatorKind::Contains, false, "Missing items: [\"x\"]"),
        ]));
        assert!(!report.passed());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].0, ValidatorKind::Contains);
        assert_eq!(report.rule("SchemaValidator").unwrap().reason(), "ok");
        assert!(report.rule("TokenValidator").is_none());
        assert!(report.rule("Bogus").is_none());
    }

    #[test]
    fn test_to_json_uses_tags() {
        let report = AisertReport::from_status(&status_with(&[(
            ValidatorKind::Token,
            true,
            "Token count 3 is within limit 10",
        )]));
        assert_eq!(
            report.to_json(),
            json!({
                "status": true,
                "rules": {
                    "TokenValidator": {"status": true, "reason": "Token count 3 is within limit 10"}
                }
            })
        );
    }

    #[test]
    fn test_serde_round_trip_keeps_timestamp() {
        let report = AisertReport::from_status(&status_with(&[(ValidatorKind::Semantic, false, "low")]));
        let text = serde_json::to_string(&report).unwrap();
        assert!(text.contains("\"SemanticValidator\""));
        let back: AisertReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_display() {
        let report = AisertReport::from_status(&status_with(&[
            (ValidatorKind::Schema, true, "matches"),
            (ValidatorKind::Contains, false, "missing"),
        ]));
        let text = report.to_string();
        assert!(text.starts_with("FAILED (1 of 2 rules passed)"));
        assert!(text.contains("[PASS] SchemaValidator: matches"));
        assert!(text.contains("[FAIL] ContainsValidator: missing"));
    }
}
