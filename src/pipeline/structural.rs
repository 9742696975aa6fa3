//! Stage-1 structural validation: record-local checks, no ledger access.
//!
//! A pure function of the record and the supplied clock date. The clock is an
//! argument, not a call to `now()`, so a stored result can be reproduced
//! exactly during audit replay. Anything that would make downstream
//! arithmetic meaningless is BLOCKING; everything else is a WARNING the
//! reviewer sees but can accept.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use super::types::{IssueKind, ValidationIssue, ValidationResult, ValidationStage};
use crate::config;
use crate::models::BillRecord;

/// Run every structural check against one record.
///
/// Currency membership needs no check here: the schema's currency type is the
/// supported set, so an unsupported code cannot reach this function.
pub fn validate_structure(record: &BillRecord, today: NaiveDate) -> ValidationResult {
    let mut issues = Vec::new();

    check_vendor(record, &mut issues);
    check_amounts(record, &mut issues);
    check_line_items(record, &mut issues);
    check_dates(record, today, &mut issues);
    check_confidence(record, &mut issues);

    let result = ValidationResult::new(record.clone(), ValidationStage::Structural, issues);
    if result.passed() {
        tracing::debug!(
            record_id = %record.id,
            warnings = result.warnings().count(),
            "Structural validation passed"
        );
    } else {
        tracing::warn!(
            record_id = %record.id,
            blocking = result.blocking_issues().count(),
            warnings = result.warnings().count(),
            "Structural validation failed"
        );
    }
    result
}

fn check_vendor(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    if record.vendor_name.trim().is_empty() {
        issues.push(
            ValidationIssue::blocking("vendor_name", IssueKind::Missing, "vendor name is empty")
                .hint("enter the vendor name from the bill header"),
        );
    } else if record.vendor_name.len() > config::MAX_VENDOR_NAME_LEN {
        issues.push(ValidationIssue::warning(
            "vendor_name",
            IssueKind::OutOfRange,
            format!(
                "vendor name is {} characters, longer than the {} cap",
                record.vendor_name.len(),
                config::MAX_VENDOR_NAME_LEN
            ),
        ));
    }
}

fn check_amounts(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    let total = match record.total_amount {
        Some(total) => total,
        None => {
            issues.push(
                ValidationIssue::blocking(
                    "total_amount",
                    IssueKind::Missing,
                    "no declared total amount",
                )
                .hint("re-scan the bill or enter the total manually"),
            );
            return;
        }
    };

    if total <= Decimal::ZERO {
        issues.push(ValidationIssue::blocking(
            "total_amount",
            IssueKind::OutOfRange,
            format!("declared total {total} is not positive"),
        ));
    } else if total > config::max_total_amount() {
        issues.push(ValidationIssue::warning(
            "total_amount",
            IssueKind::OutOfRange,
            format!(
                "declared total {total} exceeds the plausible maximum of {}",
                config::max_total_amount()
            ),
        ));
    } else if total < config::min_total_amount() {
        issues.push(ValidationIssue::warning(
            "total_amount",
            IssueKind::OutOfRange,
            format!("declared total {total} is below one currency unit"),
        ));
    }
}

fn check_line_items(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    if record.line_items.len() > config::MAX_LINE_ITEMS {
        issues.push(ValidationIssue::blocking(
            "line_items",
            IssueKind::OutOfRange,
            format!(
                "{} line items exceeds the cap of {}",
                record.line_items.len(),
                config::MAX_LINE_ITEMS
            ),
        ));
    }

    for (i, item) in record.line_items.iter().enumerate() {
        if item.amount < Decimal::ZERO {
            issues.push(ValidationIssue::blocking(
                format!("line_items[{i}].amount"),
                IssueKind::OutOfRange,
                format!("line item amount {} is negative", item.amount),
            ));
        }
        if item.description.trim().is_empty() {
            issues.push(ValidationIssue::warning(
                format!("line_items[{i}].description"),
                IssueKind::Missing,
                "line item has no description",
            ));
        }
    }
}

fn check_dates(record: &BillRecord, today: NaiveDate, issues: &mut Vec<ValidationIssue>) {
    match record.issue_date {
        None => issues.push(
            ValidationIssue::warning("issue_date", IssueKind::Missing, "no issue date")
                .hint("undated bills are invisible to month and year queries"),
        ),
        Some(date) => {
            if date > today + Duration::days(config::FUTURE_DATE_TOLERANCE_DAYS) {
                issues.push(ValidationIssue::warning(
                    "issue_date",
                    IssueKind::OutOfRange,
                    format!("issue date {date} is more than a week in the future"),
                ));
            } else if date < today - Duration::days(config::MAX_BILL_AGE_DAYS) {
                issues.push(ValidationIssue::warning(
                    "issue_date",
                    IssueKind::OutOfRange,
                    format!("issue date {date} is more than two years old"),
                ));
            }
        }
    }

    if record.due_date.is_none() {
        issues.push(ValidationIssue::warning(
            "due_date",
            IssueKind::Missing,
            "no due date",
        ));
    }
}

fn check_confidence(record: &BillRecord, issues: &mut Vec<ValidationIssue>) {
    if !(0.0..=1.0).contains(&record.confidence) {
        issues.push(ValidationIssue::warning(
            "confidence",
            IssueKind::OutOfRange,
            format!(
                "extraction confidence {} is outside the range 0 to 1",
                record.confidence
            ),
        ));
    }
}
