use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = StorageError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StorageError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Category {
    Electricity => "electricity",
    Water => "water",
    Gas => "gas",
    Internet => "internet",
    Mobile => "mobile",
    Groceries => "groceries",
    Medical => "medical",
    Insurance => "insurance",
    Rent => "rent",
    Maintenance => "maintenance",
    Fuel => "fuel",
    Uncategorized => "uncategorized",
});

str_enum!(Currency {
    Inr => "INR",
    Usd => "USD",
    Eur => "EUR",
    Gbp => "GBP",
    Jpy => "JPY",
});

str_enum!(PaymentStatus {
    Unpaid => "unpaid",
    Paid => "paid",
    Partial => "partial",
    Overdue => "overdue",
});

str_enum!(Actor {
    System => "system",
    Human => "human",
});

str_enum!(AuditAction {
    ExtractionNormalized => "extraction_normalized",
    StructuralValidationPassed => "structural_validation_passed",
    StructuralValidationFailed => "structural_validation_failed",
    SemanticValidationPassed => "semantic_validation_passed",
    SemanticValidationFailed => "semantic_validation_failed",
    ReviewPresented => "review_presented",
    UserConfirmed => "user_confirmed",
    UserRejected => "user_rejected",
    UserEdited => "user_edited",
    BillSaved => "bill_saved",
    SaveFailed => "save_failed",
    QueryPlanned => "query_planned",
    QueryRejected => "query_rejected",
    QueryExecuted => "query_executed",
});

impl Currency {
    /// Smallest representable unit: one paisa/cent, or one whole yen.
    pub fn smallest_unit(&self) -> Decimal {
        match self {
            Currency::Jpy => Decimal::ONE,
            _ => Decimal::new(1, 2),
        }
    }

    /// Display symbol for human-readable messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Jpy => "¥",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_round_trip() {
        for (variant, s) in [
            (Category::Electricity, "electricity"),
            (Category::Water, "water"),
            (Category::Gas, "gas"),
            (Category::Internet, "internet"),
            (Category::Mobile, "mobile"),
            (Category::Groceries, "groceries"),
            (Category::Medical, "medical"),
            (Category::Insurance, "insurance"),
            (Category::Rent, "rent"),
            (Category::Maintenance, "maintenance"),
            (Category::Fuel, "fuel"),
            (Category::Uncategorized, "uncategorized"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Category::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn currency_round_trip() {
        for (variant, s) in [
            (Currency::Inr, "INR"),
            (Currency::Usd, "USD"),
            (Currency::Eur, "EUR"),
            (Currency::Gbp, "GBP"),
            (Currency::Jpy, "JPY"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Currency::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn payment_status_round_trip() {
        for (variant, s) in [
            (PaymentStatus::Unpaid, "unpaid"),
            (PaymentStatus::Paid, "paid"),
            (PaymentStatus::Partial, "partial"),
            (PaymentStatus::Overdue, "overdue"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(PaymentStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn audit_action_round_trip() {
        for (variant, s) in [
            (AuditAction::ExtractionNormalized, "extraction_normalized"),
            (AuditAction::UserConfirmed, "user_confirmed"),
            (AuditAction::BillSaved, "bill_saved"),
            (AuditAction::QueryExecuted, "query_executed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AuditAction::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Category::from_str("invalid").is_err());
        assert!(Currency::from_str("inr").is_err());
        assert!(PaymentStatus::from_str("").is_err());
    }

    #[test]
    fn smallest_unit_per_currency() {
        assert_eq!(Currency::Inr.smallest_unit(), Decimal::new(1, 2));
        assert_eq!(Currency::Jpy.smallest_unit(), Decimal::ONE);
    }
}
