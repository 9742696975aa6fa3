//! Immutable point-in-time views of the approved-bill ledger.
//!
//! Stage-2 validation and query execution never touch a live store: they read
//! a `LedgerSnapshot` taken at operation start, so their outputs are
//! reproducible for audit replay even if the store is mutated mid-flight.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::BillRecord;

/// Inclusive calendar date range.
///
/// `start > end` is representable and matches nothing; the planner produces
/// such ranges when an intent's window lies entirely outside the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Intersection with `bounds`, keeping whatever overlap exists.
    pub fn clamp_to(&self, bounds: &DateRange) -> DateRange {
        DateRange {
            start: self.start.max(bounds.start),
            end: self.end.min(bounds.end),
        }
    }
}

/// Point-in-time copy of the ledger, in first-appended order.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    records: Vec<BillRecord>,
    taken_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    pub fn new(records: Vec<BillRecord>) -> Self {
        Self {
            records,
            taken_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Records in the order they entered the ledger.
    pub fn records(&self) -> &[BillRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Earliest and latest issue dates across dated records, if any.
    pub fn date_bounds(&self) -> Option<DateRange> {
        let mut dates = self.records.iter().filter_map(|r| r.issue_date);
        let first = dates.next()?;
        let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(DateRange::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Currency, PaymentStatus};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn dated_record(date: Option<NaiveDate>) -> BillRecord {
        BillRecord {
            id: Uuid::new_v4(),
            vendor_name: "Acme".into(),
            issue_date: date,
            due_date: None,
            currency: Currency::Inr,
            line_items: Vec::new(),
            total_amount: Some(Decimal::new(10_000, 2)),
            subtotal: None,
            tax_amount: None,
            category: Category::Uncategorized,
            bill_number: None,
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            source_image: None,
            confidence: 0.9,
            created_at: Utc::now(),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 31));
        assert!(range.contains(d(2024, 3, 1)));
        assert!(range.contains(d(2024, 3, 31)));
        assert!(!range.contains(d(2024, 4, 1)));
    }

    #[test]
    fn clamp_keeps_overlap() {
        let range = DateRange::new(d(2024, 1, 1), d(2024, 12, 31));
        let bounds = DateRange::new(d(2024, 3, 1), d(2024, 6, 30));
        assert_eq!(range.clamp_to(&bounds), bounds);
    }

    #[test]
    fn clamp_disjoint_matches_nothing() {
        let range = DateRange::new(d(2030, 1, 1), d(2030, 12, 31));
        let bounds = DateRange::new(d(2024, 1, 1), d(2024, 12, 31));
        let clamped = range.clamp_to(&bounds);
        assert!(clamped.start > clamped.end);
        assert!(!clamped.contains(d(2024, 6, 1)));
        assert!(!clamped.contains(d(2030, 6, 1)));
    }

    #[test]
    fn date_bounds_span_dated_records() {
        let snapshot = LedgerSnapshot::new(vec![
            dated_record(Some(d(2024, 3, 5))),
            dated_record(None),
            dated_record(Some(d(2024, 1, 2))),
            dated_record(Some(d(2024, 7, 19))),
        ]);
        let bounds = snapshot.date_bounds().unwrap();
        assert_eq!(bounds.start, d(2024, 1, 2));
        assert_eq!(bounds.end, d(2024, 7, 19));
    }

    #[test]
    fn date_bounds_empty_when_undated() {
        let snapshot = LedgerSnapshot::new(vec![dated_record(None)]);
        assert!(snapshot.date_bounds().is_none());
        assert!(LedgerSnapshot::empty().date_bounds().is_none());
    }
}
