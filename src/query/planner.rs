//! Lowers an untrusted [`QueryIntent`] into a checked [`QueryPlan`].
//!
//! The planner is the trust boundary between the language-model translation
//! step and the ledger: every field name, comparator, value and grouping is
//! checked against the record schema, and anything that does not line up is
//! refused with a specific [`UnsupportedQueryError`]. The planner never
//! guesses what the caller "probably meant".

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use super::types::{
    Comparator, FieldKind, FieldRef, FilterValue, GroupBy, IntentFilter, PlanFilter, QueryIntent,
    QueryOperation, QueryPlan,
};
use super::UnsupportedQueryError;
use crate::config;
use crate::ledger::LedgerSnapshot;
use crate::models::{Category, Currency, PaymentStatus};

pub fn plan(
    intent: &QueryIntent,
    snapshot: &LedgerSnapshot,
) -> Result<QueryPlan, UnsupportedQueryError> {
    let operation = QueryOperation::parse(&intent.operation)
        .ok_or_else(|| UnsupportedQueryError::UnknownOperation(intent.operation.clone()))?;

    let target = lower_target(operation, intent.target.as_deref())?;

    let group_by = match intent.group_by.as_deref() {
        None => None,
        Some(text) => {
            let group = GroupBy::parse(text)
                .ok_or_else(|| UnsupportedQueryError::UnknownGroupBy(text.to_string()))?;
            if operation == QueryOperation::List {
                return Err(UnsupportedQueryError::GroupingUnsupported(
                    operation.as_str().to_string(),
                ));
            }
            Some(group)
        }
    };

    let filters = intent
        .filters
        .iter()
        .map(lower_filter)
        .collect::<Result<Vec<_>, _>>()?;

    let time_range = match intent.time_range {
        None => None,
        Some(range) => {
            if range.start > range.end {
                return Err(UnsupportedQueryError::InvertedTimeRange {
                    start: range.start,
                    end: range.end,
                });
            }
            // Bound the range to the ledger's own lifetime; an undated ledger
            // has no bounds and the range stands as given.
            match snapshot.date_bounds() {
                Some(bounds) => Some(range.clamp_to(&bounds)),
                None => Some(range),
            }
        }
    };

    let plan = QueryPlan {
        operation,
        target,
        filters,
        group_by,
        time_range,
        list_cap: config::MAX_LIST_ROWS,
    };

    tracing::debug!(
        operation = operation.as_str(),
        filters = plan.filters.len(),
        group_by = ?plan.group_by,
        "Query intent lowered to plan"
    );
    Ok(plan)
}

/// Aggregations fold the totals column; COUNT and LIST take no target.
///
/// A target named by the intent is always checked, even when the operation
/// will not use it, so a bad field name is refused rather than ignored.
fn lower_target(
    operation: QueryOperation,
    target: Option<&str>,
) -> Result<Option<FieldRef>, UnsupportedQueryError> {
    let named = match target {
        Some(text) => Some(
            FieldRef::parse(text)
                .ok_or_else(|| UnsupportedQueryError::UnknownField(text.to_string()))?,
        ),
        None => None,
    };

    if !operation.needs_numeric_target() {
        return Ok(None);
    }

    let field = named.unwrap_or(FieldRef::TotalAmount);
    if field.kind() != FieldKind::Amount {
        return Err(UnsupportedQueryError::NonNumericTarget {
            operation: operation.as_str().to_string(),
            field: field.as_str().to_string(),
        });
    }
    Ok(Some(field))
}

fn lower_filter(filter: &IntentFilter) -> Result<PlanFilter, UnsupportedQueryError> {
    let field = FieldRef::parse(&filter.field)
        .ok_or_else(|| UnsupportedQueryError::UnknownField(filter.field.clone()))?;

    let comparator = Comparator::parse(&filter.comparator).ok_or_else(|| {
        UnsupportedQueryError::ComparatorMismatch {
            field: field.as_str().to_string(),
            comparator: filter.comparator.clone(),
        }
    })?;

    if !comparator_allowed(field.kind(), comparator) {
        return Err(UnsupportedQueryError::ComparatorMismatch {
            field: field.as_str().to_string(),
            comparator: comparator.as_str().to_string(),
        });
    }

    let value = coerce_value(field, &filter.value).ok_or_else(|| {
        UnsupportedQueryError::ValueTypeMismatch {
            field: field.as_str().to_string(),
            value: filter.value.to_string(),
        }
    })?;

    Ok(PlanFilter {
        field,
        comparator,
        value,
    })
}

fn comparator_allowed(kind: FieldKind, comparator: Comparator) -> bool {
    use Comparator::*;
    match kind {
        FieldKind::Text => matches!(comparator, Eq | Ne | Contains),
        FieldKind::Amount | FieldKind::Date => matches!(comparator, Eq | Ne | Lt | Lte | Gt | Gte),
        FieldKind::Category | FieldKind::Currency | FieldKind::PaymentStatus => {
            matches!(comparator, Eq | Ne)
        }
    }
}

/// Strict coercion: exactly the shapes the schema can compare, nothing
/// looser. Dates are ISO only; enums must name a member.
fn coerce_value(field: FieldRef, value: &Value) -> Option<FilterValue> {
    match field.kind() {
        FieldKind::Text => value
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| FilterValue::Text(s.to_string())),
        FieldKind::Amount => match value {
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok().map(FilterValue::Amount),
            Value::String(s) => Decimal::from_str(s.trim()).ok().map(FilterValue::Amount),
            _ => None,
        },
        FieldKind::Date => value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .map(FilterValue::Date),
        FieldKind::Category => value
            .as_str()
            .and_then(|s| Category::from_str(&s.trim().to_lowercase()).ok())
            .map(FilterValue::Category),
        FieldKind::Currency => value
            .as_str()
            .and_then(|s| Currency::from_str(&s.trim().to_uppercase()).ok())
            .map(FilterValue::Currency),
        FieldKind::PaymentStatus => value
            .as_str()
            .and_then(|s| PaymentStatus::from_str(&s.trim().to_lowercase()).ok())
            .map(FilterValue::PaymentStatus),
    }
}
