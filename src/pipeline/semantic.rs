//! Stage-2 semantic validation: cross-field and cross-record checks.
//!
//! Runs only on records that cleared Stage-1, against an immutable ledger
//! snapshot. Arithmetic dishonesty (line items that do not add up, a due date
//! before the issue date) is BLOCKING; everything that needs human judgment
//! (a suspected duplicate, a shaky extraction) is a WARNING. The record is
//! never auto-corrected and the snapshot is never written.

use rust_decimal::Decimal;

use super::types::{IssueKind, ValidationIssue, ValidationResult, ValidationStage};
use crate::config;
use crate::ledger::LedgerSnapshot;
use crate::models::BillRecord;

pub fn validate_semantics(record: &BillRecord, snapshot: &LedgerSnapshot) -> ValidationResult {
    let mut issues = Vec::new();

    check_reconciliation(record, &mut issues);
    check_date_order(record, &mut issues);
    check_duplicates(record, snapshot, &mut issues);
    check_confidence_floor(record, &mut issues);
    check_subtotal_tax(record, &mut issues);
    check_vendor_plausibility(record, &mut issues);

    let result = ValidationResult::new(record.clone(), ValidationStage::Semantic, issues);
    if result.passed() {
        tracing::debug!(
            record_id = %record.id,
            warnings = result.warnings().count(),
            "Semantic validation passed"
        );
    } else {
        tracing::warn!(
            record_id = %record.id,
            blocking = result.blocking_issues().count(),
            warnings = result.warnings().count(),
            "Semantic validation failed"
        );
    }
    result
}

/// Line-item sum must land within tolerance of the declared total.
///
/// Tolerance is the larger of the reconcile ratio applied to the total and
/// one smallest unit of the record's currency, so tiny bills are not failed
/// over sub-paisa rounding.
fn check_reconciliation(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    let total = match record.total_amount {
        Some(total) => total,
        None => return,
    };
    if record.line_items.is_empty() {
        return;
    }

    let sum = record.line_item_sum();
    let tolerance =
        (config::reconcile_tolerance_ratio() * total.abs()).max(record.currency.smallest_unit());
    let gap = (sum - total).abs();

    if gap > tolerance {
        issues.push(
            ValidationIssue::blocking(
                "total_amount",
                IssueKind::Inconsistent,
                format!("line items sum to {sum} but the declared total is {total}"),
            )
            .hint("check for a missed or misread line item, or correct the total"),
        );
    }
}

fn check_date_order(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    if let (Some(issue), Some(due)) = (record.issue_date, record.due_date) {
        if due < issue {
            issues.push(ValidationIssue::blocking(
                "due_date",
                IssueKind::Inconsistent,
                format!("due date {due} is before issue date {issue}"),
            ));
        }
    }
}

/// Same vendor, same declared total, issue date within the duplicate window.
///
/// A match is a WARNING, never an auto-reject: recurring bills legitimately
/// repeat vendor and amount, and only the human can tell a rescan from a new
/// billing cycle.
fn check_duplicates(
    record: &BillRecord,
    snapshot: &LedgerSnapshot,
    issues: &mut Vec<ValidationIssue>,
) {
    let (total, date) = match (record.total_amount, record.issue_date) {
        (Some(total), Some(date)) => (total, date),
        _ => return,
    };

    for existing in snapshot.records() {
        if existing.id == record.id {
            continue;
        }
        let same_vendor = existing.vendor_key() == record.vendor_key();
        let same_total = existing.total_amount == Some(total);
        let near_date = existing
            .issue_date
            .is_some_and(|d| (d - date).num_days().abs() <= config::DUPLICATE_WINDOW_DAYS);

        if same_vendor && same_total && near_date {
            issues.push(
                ValidationIssue::warning(
                    "vendor_name",
                    IssueKind::DuplicateSuspect,
                    format!(
                        "a bill from {} for {total} dated {} is already in the ledger",
                        existing.vendor_name,
                        existing
                            .issue_date
                            .map(|d| d.to_string())
                            .unwrap_or_default()
                    ),
                )
                .hint("approve only if this is a genuinely separate bill"),
            );
            break;
        }
    }
}

fn check_confidence_floor(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    if record.confidence < config::CONFIDENCE_FLOOR {
        issues.push(ValidationIssue::warning(
            "confidence",
            IssueKind::OutOfRange,
            format!(
                "extraction confidence {:.2} is below the review floor of {:.2}",
                record.confidence,
                config::CONFIDENCE_FLOOR
            ),
        ));
    }
}

/// Subtotal + tax should roughly equal the declared total. Flagged only when
/// both the ratio and the absolute gap are exceeded, so small bills with
/// rounded tax lines stay quiet.
fn check_subtotal_tax(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    let (total, subtotal, tax) = match (record.total_amount, record.subtotal, record.tax_amount) {
        (Some(t), Some(s), Some(x)) => (t, s, x),
        _ => return,
    };

    let expected = subtotal + tax;
    let gap = (total - expected).abs();
    let ratio_gap = expected.abs() * config::subtotal_tolerance_ratio();

    if gap > ratio_gap && gap > config::subtotal_tolerance_abs() {
        issues.push(ValidationIssue::warning(
            "total_amount",
            IssueKind::Inconsistent,
            format!("subtotal {subtotal} plus tax {tax} is {expected}, not the declared {total}"),
        ));
    }
}

/// A vendor name that is mostly digits and punctuation is usually an OCR
/// misread of an address or amount line.
fn check_vendor_plausibility(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    let name = record.vendor_name.trim();
    if name.is_empty() {
        return;
    }
    let alpha = name.chars().filter(|c| c.is_alphabetic()).count();
    let ratio = alpha as f32 / name.chars().count() as f32;

    if ratio < config::MIN_VENDOR_ALPHA_RATIO {
        issues.push(ValidationIssue::warning(
            "vendor_name",
            IssueKind::TypeMismatch,
            format!("vendor name {name:?} is mostly non-alphabetic"),
        ));
    }
}
