//! Deterministic evaluation of a checked [`QueryPlan`] against a snapshot.
//!
//! The executor never sees raw intent strings; the planner has already bound
//! every field, comparator and value. Execution is a pure fold over the
//! snapshot in first-appended order, so the same plan against the same
//! snapshot always produces an identical result. Zero matching rows is
//! [`QueryResult::NoMatch`], never a zero dressed up as an answer.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::types::{
    Comparator, ExtremeKind, FieldRef, FilterValue, GroupBy, GroupRow, PlanFilter, QueryOperation,
    QueryOutcome, QueryPlan, QueryResult,
};
use crate::ledger::LedgerSnapshot;
use crate::models::{BillRecord, Currency};

pub fn execute(plan: &QueryPlan, snapshot: &LedgerSnapshot) -> QueryResult {
    let matched: Vec<&BillRecord> = snapshot
        .records()
        .iter()
        .filter(|record| row_matches(plan, record))
        .collect();

    if matched.is_empty() {
        tracing::debug!(
            operation = plan.operation().as_str(),
            ledger_rows = snapshot.len(),
            "Query matched no ledger rows"
        );
        return QueryResult::NoMatch;
    }

    let outcome = match plan.group_by() {
        Some(group) => grouped(plan.operation(), group, &matched),
        None => match plan.operation() {
            QueryOperation::Count => Some(QueryOutcome::Count {
                bill_count: matched.len(),
            }),
            QueryOperation::List => Some(listing(&matched, plan.list_cap())),
            QueryOperation::Sum => sum(&matched),
            QueryOperation::Average => average(&matched),
            QueryOperation::Max => extreme(&matched, ExtremeKind::Max),
            QueryOperation::Min => extreme(&matched, ExtremeKind::Min),
        },
    };

    match outcome {
        Some(outcome) => {
            tracing::debug!(
                operation = plan.operation().as_str(),
                matched = matched.len(),
                "Query executed"
            );
            QueryResult::Match(outcome)
        }
        // Rows matched the filters but none carried the aggregated amount.
        None => QueryResult::NoMatch,
    }
}

// ---------------------------------------------------------------------------
// Row matching
// ---------------------------------------------------------------------------

fn row_matches(plan: &QueryPlan, record: &BillRecord) -> bool {
    if let Some(range) = plan.time_range() {
        // Undated records are invisible to time-scoped queries.
        match record.issue_date {
            Some(date) if range.contains(date) => {}
            _ => return false,
        }
    }
    plan.filters()
        .iter()
        .all(|filter| filter_matches(filter, record))
}

fn filter_matches(filter: &PlanFilter, record: &BillRecord) -> bool {
    match (filter.field, &filter.value) {
        (FieldRef::VendorName, FilterValue::Text(needle)) => {
            text_matches(filter.comparator, &record.vendor_name, needle)
        }
        (FieldRef::TotalAmount, FilterValue::Amount(target)) => record
            .total_amount
            .map(|actual| ord_matches(filter.comparator, actual, *target))
            .unwrap_or(false),
        (FieldRef::IssueDate, FilterValue::Date(target)) => record
            .issue_date
            .map(|actual| ord_matches(filter.comparator, actual, *target))
            .unwrap_or(false),
        (FieldRef::DueDate, FilterValue::Date(target)) => record
            .due_date
            .map(|actual| ord_matches(filter.comparator, actual, *target))
            .unwrap_or(false),
        (FieldRef::Category, FilterValue::Category(want)) => {
            eq_matches(filter.comparator, record.category == *want)
        }
        (FieldRef::Currency, FilterValue::Currency(want)) => {
            eq_matches(filter.comparator, record.currency == *want)
        }
        (FieldRef::PaymentStatus, FilterValue::PaymentStatus(want)) => {
            eq_matches(filter.comparator, record.payment_status == *want)
        }
        // The planner never emits a field/value pairing outside the above.
        _ => false,
    }
}

fn text_matches(comparator: Comparator, actual: &str, needle: &str) -> bool {
    match comparator {
        Comparator::Eq => actual.eq_ignore_ascii_case(needle),
        Comparator::Ne => !actual.eq_ignore_ascii_case(needle),
        Comparator::Contains => actual.to_lowercase().contains(&needle.to_lowercase()),
        _ => false,
    }
}

fn ord_matches<T: PartialOrd>(comparator: Comparator, actual: T, target: T) -> bool {
    match comparator {
        Comparator::Eq => actual == target,
        Comparator::Ne => actual != target,
        Comparator::Lt => actual < target,
        Comparator::Lte => actual <= target,
        Comparator::Gt => actual > target,
        Comparator::Gte => actual >= target,
        Comparator::Contains => false,
    }
}

fn eq_matches(comparator: Comparator, equal: bool) -> bool {
    match comparator {
        Comparator::Eq => equal,
        Comparator::Ne => !equal,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Scalar operations
// ---------------------------------------------------------------------------

/// Matched rows that carry a total, in snapshot order.
fn totals<'a>(matched: &[&'a BillRecord]) -> Vec<(Decimal, &'a BillRecord)> {
    matched
        .iter()
        .filter_map(|record| record.total_amount.map(|amount| (amount, *record)))
        .collect()
}

/// The single currency shared by every row, if there is one.
fn uniform_currency(rows: &[(Decimal, &BillRecord)]) -> Option<Currency> {
    let first = rows.first()?.1.currency.clone();
    rows.iter()
        .all(|(_, record)| record.currency == first)
        .then_some(first)
}

fn sum(matched: &[&BillRecord]) -> Option<QueryOutcome> {
    let rows = totals(matched);
    if rows.is_empty() {
        return None;
    }
    let amount: Decimal = rows.iter().map(|(amount, _)| *amount).sum();
    Some(QueryOutcome::Total {
        amount,
        currency: uniform_currency(&rows),
        bill_count: rows.len(),
    })
}

fn average(matched: &[&BillRecord]) -> Option<QueryOutcome> {
    let rows = totals(matched);
    if rows.is_empty() {
        return None;
    }
    let total: Decimal = rows.iter().map(|(amount, _)| *amount).sum();
    let amount = (total / Decimal::from(rows.len() as u64)).round_dp(2);
    Some(QueryOutcome::Average {
        amount,
        currency: uniform_currency(&rows),
        bill_count: rows.len(),
    })
}

fn extreme(matched: &[&BillRecord], kind: ExtremeKind) -> Option<QueryOutcome> {
    let mut best: Option<(Decimal, &BillRecord)> = None;
    for (amount, record) in totals(matched) {
        let better = match best {
            None => true,
            // Strict comparison keeps the first-seen row on ties.
            Some((current, _)) => match kind {
                ExtremeKind::Max => amount > current,
                ExtremeKind::Min => amount < current,
            },
        };
        if better {
            best = Some((amount, record));
        }
    }
    best.map(|(amount, record)| QueryOutcome::Extreme {
        kind,
        amount,
        currency: record.currency.clone(),
        record: Box::new(record.clone()),
    })
}

fn listing(matched: &[&BillRecord], cap: usize) -> QueryOutcome {
    QueryOutcome::Listing {
        records: matched.iter().take(cap).map(|r| (*r).clone()).collect(),
        truncated: matched.len() > cap,
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

struct GroupAccum {
    label: String,
    amounts: Vec<Decimal>,
    rows: usize,
}

fn grouped(
    operation: QueryOperation,
    group: GroupBy,
    matched: &[&BillRecord],
) -> Option<QueryOutcome> {
    // BTreeMap orders groups by key ascending; the label keeps the first-seen
    // spelling when keys fold case.
    let mut groups: BTreeMap<String, GroupAccum> = BTreeMap::new();
    for record in matched {
        let Some((key, label)) = group_key(group, record) else {
            continue;
        };
        let accum = groups.entry(key).or_insert_with(|| GroupAccum {
            label,
            amounts: Vec::new(),
            rows: 0,
        });
        accum.rows += 1;
        if let Some(amount) = record.total_amount {
            accum.amounts.push(amount);
        }
    }

    let rows: Vec<GroupRow> = groups
        .into_values()
        .filter_map(|accum| group_row(operation, accum))
        .collect();
    if rows.is_empty() {
        return None;
    }
    Some(QueryOutcome::Grouped {
        operation,
        groups: rows,
    })
}

/// Sort key and display label for a record's group. Vendors group
/// case-insensitively; month and year groups skip undated records.
fn group_key(group: GroupBy, record: &BillRecord) -> Option<(String, String)> {
    match group {
        GroupBy::Category => {
            let name = record.category.as_str().to_string();
            Some((name.clone(), name))
        }
        GroupBy::Vendor => Some((record.vendor_name.to_lowercase(), record.vendor_name.clone())),
        GroupBy::Month => record.issue_date.map(|date| {
            let label = date.format("%Y-%m").to_string();
            (label.clone(), label)
        }),
        GroupBy::Year => record.issue_date.map(|date| {
            let label = date.format("%Y").to_string();
            (label.clone(), label)
        }),
    }
}

fn group_row(operation: QueryOperation, accum: GroupAccum) -> Option<GroupRow> {
    let value = match operation {
        QueryOperation::Count => Decimal::from(accum.rows as u64),
        QueryOperation::Sum => {
            if accum.amounts.is_empty() {
                return None;
            }
            accum.amounts.iter().copied().sum()
        }
        QueryOperation::Average => {
            if accum.amounts.is_empty() {
                return None;
            }
            let total: Decimal = accum.amounts.iter().copied().sum();
            (total / Decimal::from(accum.amounts.len() as u64)).round_dp(2)
        }
        QueryOperation::Max => accum
            .amounts
            .iter()
            .copied()
            .reduce(|best, next| if next > best { next } else { best })?,
        QueryOperation::Min => accum
            .amounts
            .iter()
            .copied()
            .reduce(|best, next| if next < best { next } else { best })?,
        // The planner refuses grouped listings.
        QueryOperation::List => return None,
    };
    let bill_count = match operation {
        QueryOperation::Count => accum.rows,
        _ => accum.amounts.len(),
    };
    Some(GroupRow {
        key: accum.label,
        value,
        bill_count,
    })
}
