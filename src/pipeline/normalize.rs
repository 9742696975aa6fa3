//! Extraction normalizer: raw OCR mapping in, canonical [`BillRecord`] out.
//!
//! The OCR collaborator sends a loosely-typed JSON object whose field names
//! and value shapes drift between vendors. Everything here is coercion:
//! accept the aliases we have seen in the wild, scrub currency symbols and
//! thousands separators, try the date formats bills actually carry, and map
//! free-text category guesses onto the fixed enum. The output is either a
//! fully-formed record or a [`NormalizationError`]; nothing partial leaves
//! this module.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::models::{BillRecord, Category, Currency, LineItem, PaymentStatus};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("extraction has no usable vendor name")]
    MissingVendor,

    #[error("extraction carries no amount of any kind")]
    NoAmounts,

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("raw extraction is not a JSON object")]
    NotAnObject,
}

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// Untrusted field map as produced by the OCR stage.
#[derive(Debug, Clone, Default)]
pub struct RawExtraction(pub serde_json::Map<String, Value>);

impl RawExtraction {
    pub fn try_from_value(value: Value) -> Result<Self, NormalizationError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(NormalizationError::NotAnObject),
        }
    }

    /// First non-null value under any of the given aliases.
    fn first(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .find_map(|k| self.0.get(*k))
            .filter(|v| !v.is_null())
    }

    /// First alias that holds a non-empty string, trimmed.
    fn first_str(&self, keys: &[&str]) -> Option<String> {
        self.first(keys)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

pub fn normalize(raw: &RawExtraction) -> Result<BillRecord, NormalizationError> {
    let vendor_name = raw
        .first_str(&["vendor", "vendor_name", "merchant", "supplier"])
        .ok_or(NormalizationError::MissingVendor)?;

    let currency = match raw.first(&["currency", "currency_code"]) {
        Some(value) => coerce_currency(value)?,
        None => config::DEFAULT_CURRENCY,
    };

    let total_amount = raw
        .first(&["total", "total_amount", "amount"])
        .and_then(coerce_amount);
    let subtotal = raw.first(&["subtotal", "sub_total"]).and_then(coerce_amount);
    let tax_amount = raw
        .first(&["tax", "tax_amount", "gst"])
        .and_then(coerce_amount);

    let line_items = raw
        .first(&["items", "line_items"])
        .and_then(Value::as_array)
        .map(|entries| coerce_line_items(entries))
        .unwrap_or_default();

    if total_amount.is_none() && subtotal.is_none() && line_items.is_empty() {
        return Err(NormalizationError::NoAmounts);
    }

    let issue_date = raw
        .first(&["date", "bill_date", "issue_date"])
        .and_then(coerce_date);
    let due_date = raw.first(&["due_date", "due"]).and_then(coerce_date);

    let category = raw
        .first_str(&["category", "bill_type"])
        .map(|s| coerce_category(&s))
        .unwrap_or(Category::Uncategorized);

    let confidence = raw
        .first(&["confidence", "confidence_score"])
        .and_then(Value::as_f64)
        .map(|f| f as f32)
        .unwrap_or(0.0);

    let record = BillRecord {
        id: Uuid::new_v4(),
        vendor_name,
        issue_date,
        due_date,
        currency,
        line_items,
        total_amount,
        subtotal,
        tax_amount,
        category,
        bill_number: raw.first_str(&["bill_number", "invoice_number", "bill_no"]),
        payment_status: PaymentStatus::Unpaid,
        notes: raw.first_str(&["notes", "remarks"]),
        source_image: raw.first_str(&["image", "source_image", "image_url", "image_ref"]),
        confidence,
        created_at: Utc::now(),
    };

    tracing::debug!(
        vendor = %record.vendor_name,
        total = ?record.total_amount,
        items = record.line_items.len(),
        category = record.category.as_str(),
        "Normalized extraction"
    );

    Ok(record)
}

// ---------------------------------------------------------------------------
// Field coercion
// ---------------------------------------------------------------------------

/// Pull a decimal out of a JSON number or a messy amount string.
///
/// Strings go through a numeric-token scan so `"₹1,234.56"`, `"Rs. 450"` and
/// `"1,500.00 INR"` all coerce; commas are treated as thousands separators.
fn coerce_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain)),
        Value::String(s) => parse_amount_str(s),
        _ => None,
    }
}

fn parse_amount_str(raw: &str) -> Option<Decimal> {
    static AMOUNT_TOKEN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").unwrap());

    let token = AMOUNT_TOKEN.find(raw)?.as_str();
    Decimal::from_str(&token.replace(',', "")).ok()
}

/// Formats bills actually arrive in, day-first variants before ambiguous ones.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
];

fn coerce_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn coerce_currency(value: &Value) -> Result<Currency, NormalizationError> {
    let text = match value.as_str() {
        Some(s) => s.trim(),
        None => return Err(NormalizationError::UnsupportedCurrency(value.to_string())),
    };
    if text.is_empty() {
        return Ok(config::DEFAULT_CURRENCY);
    }

    let by_symbol = match text {
        "₹" | "Rs" | "Rs." | "INR" => Some(Currency::Inr),
        "$" => Some(Currency::Usd),
        "€" => Some(Currency::Eur),
        "£" => Some(Currency::Gbp),
        "¥" => Some(Currency::Jpy),
        _ => None,
    };
    if let Some(currency) = by_symbol {
        return Ok(currency);
    }

    Currency::from_str(&text.to_uppercase())
        .map_err(|_| NormalizationError::UnsupportedCurrency(text.to_string()))
}

/// Exact enum match first, then keyword containment, then the fallback bucket.
fn coerce_category(text: &str) -> Category {
    let lowered = text.trim().to_lowercase();
    if let Ok(category) = Category::from_str(&lowered) {
        return category;
    }

    const KEYWORDS: &[(&str, Category)] = &[
        ("power", Category::Electricity),
        ("electric", Category::Electricity),
        ("water", Category::Water),
        ("gas", Category::Gas),
        ("broadband", Category::Internet),
        ("wifi", Category::Internet),
        ("net", Category::Internet),
        ("phone", Category::Mobile),
        ("mobile", Category::Mobile),
        ("telecom", Category::Mobile),
        ("grocer", Category::Groceries),
        ("supermarket", Category::Groceries),
        ("doctor", Category::Medical),
        ("hospital", Category::Medical),
        ("pharma", Category::Medical),
        ("medic", Category::Medical),
        ("insur", Category::Insurance),
        ("rent", Category::Rent),
        ("maint", Category::Maintenance),
        ("repair", Category::Maintenance),
        ("society", Category::Maintenance),
        ("fuel", Category::Fuel),
        ("petrol", Category::Fuel),
        ("diesel", Category::Fuel),
    ];

    KEYWORDS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, category)| category.clone())
        .unwrap_or(Category::Uncategorized)
}

fn coerce_line_items(entries: &[Value]) -> Vec<LineItem> {
    entries
        .iter()
        .filter_map(|entry| {
            let item = entry.as_object()?;
            let amount = ["amt", "amount", "price", "value"]
                .iter()
                .find_map(|k| item.get(*k))
                .and_then(coerce_amount)?;
            let description = ["desc", "description", "name", "label"]
                .iter()
                .find_map(|k| item.get(*k))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| "(unlabelled item)".to_string());
            Some(LineItem {
                description,
                amount,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
