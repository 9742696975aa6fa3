//! Intent, plan and result types for the query engine.
//!
//! [`QueryIntent`] is the untrusted side: strings from an external
//! translation step. [`QueryPlan`] is the trusted side: every field,
//! comparator and value has been checked against the record schema. Only the
//! planner turns one into the other.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::DateRange;
use crate::models::{BillRecord, Category, Currency, PaymentStatus};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOperation {
    Sum,
    Count,
    List,
    Average,
    Max,
    Min,
}

impl QueryOperation {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "sum" | "total" => Some(QueryOperation::Sum),
            "count" => Some(QueryOperation::Count),
            "list" => Some(QueryOperation::List),
            "average" | "avg" | "mean" => Some(QueryOperation::Average),
            "max" | "maximum" | "highest" => Some(QueryOperation::Max),
            "min" | "minimum" | "lowest" => Some(QueryOperation::Min),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::Sum => "sum",
            QueryOperation::Count => "count",
            QueryOperation::List => "list",
            QueryOperation::Average => "average",
            QueryOperation::Max => "max",
            QueryOperation::Min => "min",
        }
    }

    /// Aggregations that fold amounts need a numeric target field.
    pub fn needs_numeric_target(&self) -> bool {
        matches!(
            self,
            QueryOperation::Sum | QueryOperation::Average | QueryOperation::Max | QueryOperation::Min
        )
    }
}

// ---------------------------------------------------------------------------
// Fields and comparators
// ---------------------------------------------------------------------------

/// A queryable field of the record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRef {
    VendorName,
    Category,
    TotalAmount,
    IssueDate,
    DueDate,
    Currency,
    PaymentStatus,
}

/// The type a field carries, which decides valid comparators and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Amount,
    Date,
    Category,
    Currency,
    PaymentStatus,
}

impl FieldRef {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "vendor" | "vendor_name" | "merchant" => Some(FieldRef::VendorName),
            "category" => Some(FieldRef::Category),
            "total" | "amount" | "total_amount" => Some(FieldRef::TotalAmount),
            "date" | "issue_date" | "bill_date" => Some(FieldRef::IssueDate),
            "due_date" => Some(FieldRef::DueDate),
            "currency" => Some(FieldRef::Currency),
            "payment_status" | "status" => Some(FieldRef::PaymentStatus),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRef::VendorName => "vendor_name",
            FieldRef::Category => "category",
            FieldRef::TotalAmount => "total_amount",
            FieldRef::IssueDate => "issue_date",
            FieldRef::DueDate => "due_date",
            FieldRef::Currency => "currency",
            FieldRef::PaymentStatus => "payment_status",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldRef::VendorName => FieldKind::Text,
            FieldRef::Category => FieldKind::Category,
            FieldRef::TotalAmount => FieldKind::Amount,
            FieldRef::IssueDate | FieldRef::DueDate => FieldKind::Date,
            FieldRef::Currency => FieldKind::Currency,
            FieldRef::PaymentStatus => FieldKind::PaymentStatus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Ne,
    Contains,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparator {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "eq" | "=" | "==" => Some(Comparator::Eq),
            "ne" | "!=" => Some(Comparator::Ne),
            "contains" | "like" => Some(Comparator::Contains),
            "lt" | "<" => Some(Comparator::Lt),
            "lte" | "<=" => Some(Comparator::Lte),
            "gt" | ">" => Some(Comparator::Gt),
            "gte" | ">=" => Some(Comparator::Gte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Contains => "contains",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
        }
    }
}

/// A filter value already coerced to its field's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    Text(String),
    Amount(Decimal),
    Date(NaiveDate),
    Category(Category),
    Currency(Currency),
    PaymentStatus(PaymentStatus),
}

// ---------------------------------------------------------------------------
// Intent (untrusted)
// ---------------------------------------------------------------------------

/// What the external translation step claims the user asked.
///
/// All strings; nothing here is trusted until the planner has checked it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryIntent {
    pub operation: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub filters: Vec<IntentFilter>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub time_range: Option<DateRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentFilter {
    pub field: String,
    pub comparator: String,
    pub value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Plan (trusted)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Category,
    Vendor,
    Month,
    Year,
}

impl GroupBy {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "category" => Some(GroupBy::Category),
            "vendor" | "vendor_name" => Some(GroupBy::Vendor),
            "month" => Some(GroupBy::Month),
            "year" => Some(GroupBy::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Category => "category",
            GroupBy::Vendor => "vendor",
            GroupBy::Month => "month",
            GroupBy::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFilter {
    pub field: FieldRef,
    pub comparator: Comparator,
    pub value: FilterValue,
}

/// A checked, bounded query. Only the planner constructs one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub(crate) operation: QueryOperation,
    pub(crate) target: Option<FieldRef>,
    pub(crate) filters: Vec<PlanFilter>,
    pub(crate) group_by: Option<GroupBy>,
    pub(crate) time_range: Option<DateRange>,
    pub(crate) list_cap: usize,
}

impl QueryPlan {
    pub fn operation(&self) -> QueryOperation {
        self.operation
    }

    pub fn target(&self) -> Option<FieldRef> {
        self.target
    }

    pub fn filters(&self) -> &[PlanFilter] {
        &self.filters
    }

    pub fn group_by(&self) -> Option<GroupBy> {
        self.group_by
    }

    pub fn time_range(&self) -> Option<DateRange> {
        self.time_range
    }

    pub fn list_cap(&self) -> usize {
        self.list_cap
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Either an answer grounded in matching rows, or the explicit no-data
/// signal. Zero matching rows is always `NoMatch`, even for COUNT, so the
/// narration layer can never dress up an empty result as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResult {
    NoMatch,
    Match(QueryOutcome),
}

impl QueryResult {
    pub fn matched(&self) -> bool {
        matches!(self, QueryResult::Match(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    /// SUM over the matched rows' totals.
    Total {
        amount: Decimal,
        /// None when the matched rows mix currencies.
        currency: Option<Currency>,
        bill_count: usize,
    },
    Count {
        bill_count: usize,
    },
    Average {
        amount: Decimal,
        currency: Option<Currency>,
        bill_count: usize,
    },
    /// MAX or MIN with the witnessing record.
    Extreme {
        kind: ExtremeKind,
        amount: Decimal,
        currency: Currency,
        record: Box<BillRecord>,
    },
    Listing {
        records: Vec<BillRecord>,
        truncated: bool,
    },
    Grouped {
        operation: QueryOperation,
        groups: Vec<GroupRow>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremeKind {
    Max,
    Min,
}

/// One group of a grouped aggregation, in stable key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub key: String,
    pub value: Decimal,
    pub bill_count: usize,
}
