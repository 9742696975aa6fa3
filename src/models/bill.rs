use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Category, Currency, PaymentStatus};

/// One charge line on a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub amount: Decimal,
}

/// Canonical representation of one scanned bill.
///
/// Produced only by the normalizer (from raw OCR output) or by a human edit;
/// both paths go through the full validation pipeline before the record can
/// be approved. `total_amount` and `issue_date` stay optional here so the
/// structural validator can flag their absence instead of a constructor
/// silently inventing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub id: Uuid,
    pub vendor_name: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub total_amount: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub category: Category,
    pub bill_number: Option<String>,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub source_image: Option<String>,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

impl BillRecord {
    /// Sum of all line-item amounts; zero when there are no items.
    pub fn line_item_sum(&self) -> Decimal {
        self.line_items.iter().map(|item| item.amount).sum()
    }

    /// Vendor name folded for comparisons (duplicate detection, filters).
    pub fn vendor_key(&self) -> String {
        self.vendor_name.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> BillRecord {
        BillRecord {
            id: Uuid::new_v4(),
            vendor_name: "Tata Power".into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            currency: Currency::Inr,
            line_items: vec![
                LineItem {
                    description: "Energy charges".into(),
                    amount: Decimal::new(120_000, 2),
                },
                LineItem {
                    description: "Fixed charges".into(),
                    amount: Decimal::new(30_000, 2),
                },
            ],
            total_amount: Some(Decimal::new(150_000, 2)),
            subtotal: None,
            tax_amount: None,
            category: Category::Electricity,
            bill_number: Some("TP-2024-0301".into()),
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            source_image: Some("uploads/tp-march.jpg".into()),
            confidence: 0.92,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn line_item_sum_adds_amounts() {
        let record = make_record();
        assert_eq!(record.line_item_sum(), Decimal::new(150_000, 2));
    }

    #[test]
    fn line_item_sum_is_zero_without_items() {
        let mut record = make_record();
        record.line_items.clear();
        assert_eq!(record.line_item_sum(), Decimal::ZERO);
    }

    #[test]
    fn vendor_key_folds_case_and_whitespace() {
        let mut record = make_record();
        record.vendor_name = "  TATA Power  ".into();
        assert_eq!(record.vendor_key(), "tata power");
    }

    #[test]
    fn serializes_amounts_as_strings() {
        let record = make_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["total_amount"], serde_json::json!("1500.00"));
    }
}
