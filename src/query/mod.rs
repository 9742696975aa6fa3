//! Deterministic query engine over the ledger.
//!
//! Questions arrive as a [`QueryIntent`] produced by an external translation
//! step; the planner either lowers it to a typed [`QueryPlan`] or refuses
//! with [`UnsupportedQueryError`], and the executor runs plans against an
//! immutable snapshot. Refusal, not guessing: an intent this engine cannot
//! faithfully execute never reaches the ledger.

pub mod executor;
pub mod planner;
pub mod timeframe;
pub mod types;

pub use executor::execute;
pub use planner::plan;
pub use timeframe::{parse_reference, resolve, TimeReference};
pub use types::{
    Comparator, ExtremeKind, FieldRef, FilterValue, GroupBy, GroupRow, IntentFilter, PlanFilter,
    QueryIntent, QueryOperation, QueryOutcome, QueryPlan, QueryResult,
};

use chrono::NaiveDate;
use thiserror::Error;

/// Why an intent could not be lowered into a plan.
///
/// Every variant names the offending part, so the refusal shown to the user
/// is specific rather than a generic "cannot answer that".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnsupportedQueryError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("comparator {comparator} is not valid for field {field}")]
    ComparatorMismatch { field: String, comparator: String },

    #[error("value {value} cannot be read as a {field} value")]
    ValueTypeMismatch { field: String, value: String },

    #[error("operation {operation} needs a numeric target, not {field}")]
    NonNumericTarget { operation: String, field: String },

    #[error("unknown group-by field: {0}")]
    UnknownGroupBy(String),

    #[error("time range starts {start} after it ends {end}")]
    InvertedTimeRange { start: NaiveDate, end: NaiveDate },

    #[error("operation {0} does not support grouping")]
    GroupingUnsupported(String),
}
