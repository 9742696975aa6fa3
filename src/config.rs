use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::models::enums::Currency;

/// Application-level constants
pub const APP_NAME: &str = "Hisab";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "hisab=info"
}

/// Get the application data directory
/// ~/Hisab/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Hisab")
}

/// Default path of the SQLite ledger database.
pub fn ledger_db_path() -> PathBuf {
    app_data_dir().join("ledger.db")
}

// ---------------------------------------------------------------------------
// Intake policy
// ---------------------------------------------------------------------------

/// Currency assumed when the extraction carries no currency marker.
pub const DEFAULT_CURRENCY: Currency = Currency::Inr;

/// Extraction confidence below this floor is flagged for careful review.
pub const CONFIDENCE_FLOOR: f32 = 0.60;

/// Days into the future an issue date may lie before it is flagged.
pub const FUTURE_DATE_TOLERANCE_DAYS: i64 = 7;

/// Days into the past beyond which an issue date looks like an OCR misread.
pub const MAX_BILL_AGE_DAYS: i64 = 730;

/// Window within which same-vendor same-amount bills count as duplicate suspects.
pub const DUPLICATE_WINDOW_DAYS: i64 = 7;

/// Upper bound on line items per bill; more than this is not a household bill.
pub const MAX_LINE_ITEMS: usize = 100;

/// Longest vendor name kept without a warning.
pub const MAX_VENDOR_NAME_LEN: usize = 200;

/// Below this share of alphabetic characters a vendor name looks like noise.
pub const MIN_VENDOR_ALPHA_RATIO: f32 = 0.30;

/// Most rows a LIST query returns.
pub const MAX_LIST_ROWS: usize = 100;

/// Fraction of the declared total within which the line-item sum must fall.
/// The effective tolerance is this ratio or the currency's smallest unit,
/// whichever is larger.
pub fn reconcile_tolerance_ratio() -> Decimal {
    Decimal::new(1, 2) // 1%
}

/// Fraction of subtotal + tax within which the declared total should fall.
pub fn subtotal_tolerance_ratio() -> Decimal {
    Decimal::new(5, 2) // 5%
}

/// Absolute floor for the subtotal check; both thresholds must be exceeded.
pub fn subtotal_tolerance_abs() -> Decimal {
    Decimal::new(10, 0)
}

/// Declared totals above this are flagged as implausibly high.
pub fn max_total_amount() -> Decimal {
    Decimal::new(1_000_000, 0)
}

/// Declared totals below one whole unit are flagged as implausibly low.
pub fn min_total_amount() -> Decimal {
    Decimal::ONE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Hisab"));
    }

    #[test]
    fn ledger_db_under_app_data() {
        let db = ledger_db_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("ledger.db"));
    }

    #[test]
    fn reconcile_ratio_is_one_percent() {
        assert_eq!(reconcile_tolerance_ratio(), Decimal::new(1, 2));
    }

    #[test]
    fn tolerance_windows_are_sane() {
        assert!(FUTURE_DATE_TOLERANCE_DAYS < MAX_BILL_AGE_DAYS);
        assert!(CONFIDENCE_FLOOR > 0.0 && CONFIDENCE_FLOOR < 1.0);
        assert!(min_total_amount() < max_total_amount());
    }
}
