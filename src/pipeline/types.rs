//! Shared types for the two-stage validation pipeline.
//!
//! Both stages report through the same [`ValidationIssue`] / [`ValidationResult`]
//! shape so the review session can store them uniformly and the audit log can
//! serialize them without caring which stage produced them.

use serde::{Deserialize, Serialize};

use crate::models::BillRecord;

// ---------------------------------------------------------------------------
// Stage / severity / verdict
// ---------------------------------------------------------------------------

/// Which pipeline stage produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    /// Record-local checks, no ledger access.
    Structural,
    /// Cross-field and cross-record checks against a ledger snapshot.
    Semantic,
}

impl ValidationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStage::Structural => "structural",
            ValidationStage::Semantic => "semantic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Stops the pipeline; the record cannot proceed until fixed.
    Blocking,
    /// Surfaced to the reviewer but does not stop the record.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required or expected field is absent.
    Missing,
    /// A value is present but not of a usable shape.
    TypeMismatch,
    /// A value is outside its plausible range.
    OutOfRange,
    /// Two or more fields disagree with each other.
    Inconsistent,
    /// The record looks like one already in the ledger.
    DuplicateSuspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// A single finding from either validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field, e.g. `line_items[2].amount`.
    pub field: String,
    pub kind: IssueKind,
    pub message: String,
    pub severity: Severity,
    /// Optional reviewer-facing hint on how to repair the record.
    pub suggested_fix: Option<String>,
}

impl ValidationIssue {
    pub fn blocking(field: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
            severity: Severity::Blocking,
            suggested_fix: None,
        }
    }

    pub fn warning(field: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
            severity: Severity::Warning,
            suggested_fix: None,
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.suggested_fix = Some(hint.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of running one validation stage over one record.
///
/// Carries a copy of the record exactly as it was validated, so a later edit
/// cannot silently invalidate an earlier verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    record: BillRecord,
    stage: ValidationStage,
    issues: Vec<ValidationIssue>,
    verdict: Verdict,
}

impl ValidationResult {
    /// The verdict is derived, never stored independently: any blocking issue
    /// fails the stage, warnings alone pass it.
    pub fn new(record: BillRecord, stage: ValidationStage, issues: Vec<ValidationIssue>) -> Self {
        let verdict = if issues.iter().any(|i| i.severity == Severity::Blocking) {
            Verdict::Fail
        } else {
            Verdict::Pass
        };
        Self {
            record,
            stage,
            issues,
            verdict,
        }
    }

    pub fn record(&self) -> &BillRecord {
        &self.record
    }

    pub fn stage(&self) -> ValidationStage {
        self.stage
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn blocking_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Blocking)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillRecord, Category, Currency, PaymentStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn make_record() -> BillRecord {
        BillRecord {
            id: Uuid::new_v4(),
            vendor_name: "Tata Power".to_string(),
            issue_date: None,
            due_date: None,
            currency: Currency::Inr,
            line_items: vec![],
            total_amount: None,
            subtotal: None,
            tax_amount: None,
            category: Category::Electricity,
            bill_number: None,
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            source_image: None,
            confidence: 0.9,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_issues_is_a_pass() {
        let result = ValidationResult::new(make_record(), ValidationStage::Structural, vec![]);
        assert_eq!(result.verdict(), Verdict::Pass);
        assert!(result.passed());
    }

    #[test]
    fn warnings_alone_still_pass() {
        let issues = vec![
            ValidationIssue::warning("due_date", IssueKind::Missing, "no due date"),
            ValidationIssue::warning("confidence", IssueKind::OutOfRange, "low confidence"),
        ];
        let result = ValidationResult::new(make_record(), ValidationStage::Semantic, issues);
        assert_eq!(result.verdict(), Verdict::Pass);
        assert_eq!(result.warnings().count(), 2);
        assert_eq!(result.blocking_issues().count(), 0);
    }

    #[test]
    fn one_blocking_issue_fails_the_stage() {
        let issues = vec![
            ValidationIssue::warning("due_date", IssueKind::Missing, "no due date"),
            ValidationIssue::blocking("total_amount", IssueKind::Missing, "no total"),
        ];
        let result = ValidationResult::new(make_record(), ValidationStage::Structural, issues);
        assert_eq!(result.verdict(), Verdict::Fail);
        assert!(!result.passed());
        assert_eq!(result.blocking_issues().count(), 1);
    }

    #[test]
    fn hint_attaches_a_suggested_fix() {
        let issue = ValidationIssue::blocking("total_amount", IssueKind::Missing, "no total")
            .hint("re-scan the bill or enter the total manually");
        assert_eq!(
            issue.suggested_fix.as_deref(),
            Some("re-scan the bill or enter the total manually")
        );
    }

    #[test]
    fn result_keeps_the_validated_record() {
        let record = make_record();
        let id = record.id;
        let result = ValidationResult::new(record, ValidationStage::Structural, vec![]);
        assert_eq!(result.record().id, id);
    }
}
