//! Deterministic resolution of symbolic time references.
//!
//! The upstream translation step hands over phrases like "this month" or
//! "March 2024"; calendar arithmetic happens here, never in the model. Both
//! steps are pure in `today`, so the same phrase on the same day always
//! resolves to the same range.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ledger::DateRange;

/// A symbolic reference, parsed but not yet anchored to a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeReference {
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
    /// A named month; without a year it means the most recent occurrence.
    Month { month: u32, year: Option<i32> },
    Year(i32),
}

/// Anchor a reference to the calendar. `None` only for out-of-calendar
/// values such as a month number above 12.
pub fn resolve(reference: &TimeReference, today: NaiveDate) -> Option<DateRange> {
    match *reference {
        TimeReference::ThisMonth => month_range(today.year(), today.month()),
        TimeReference::LastMonth => {
            let (year, month) = if today.month() == 1 {
                (today.year() - 1, 12)
            } else {
                (today.year(), today.month() - 1)
            };
            month_range(year, month)
        }
        TimeReference::ThisYear => year_range(today.year()),
        TimeReference::LastYear => year_range(today.year() - 1),
        TimeReference::Month { month, year } => {
            let year = match year {
                Some(year) => year,
                // "in March" after March means this year's; before, last year's.
                None if month > today.month() => today.year() - 1,
                None => today.year(),
            };
            month_range(year, month)
        }
        TimeReference::Year(year) => year_range(year),
    }
}

/// Parse a symbolic phrase. Underscore and space separators are
/// interchangeable; unrecognized text is `None`, never a guess.
pub fn parse_reference(text: &str) -> Option<TimeReference> {
    let normalized = text.trim().to_lowercase().replace('_', " ");
    match normalized.as_str() {
        "this month" | "current month" => return Some(TimeReference::ThisMonth),
        "last month" | "previous month" => return Some(TimeReference::LastMonth),
        "this year" | "current year" => return Some(TimeReference::ThisYear),
        "last year" | "previous year" => return Some(TimeReference::LastYear),
        _ => {}
    }

    static MONTH: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s*(\d{4})?$",
        )
        .unwrap()
    });
    if let Some(caps) = MONTH.captures(&normalized) {
        let month = month_number(caps.get(1)?.as_str())?;
        let year = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return Some(TimeReference::Month { month, year });
    }

    static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:19|20)\d{2}$").unwrap());
    if YEAR.is_match(&normalized) {
        return normalized.parse().ok().map(TimeReference::Year);
    }
    None
}

// ---------------------------------------------------------------------------

fn month_range(year: i32, month: u32) -> Option<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(DateRange::new(start, next.pred_opt()?))
}

fn year_range(year: i32) -> Option<DateRange> {
    Some(DateRange::new(
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

fn month_number(name: &str) -> Option<u32> {
    let number = match &name[..3.min(name.len())] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn today() -> NaiveDate {
        d(2024, 6, 15)
    }

    #[test]
    fn this_and_last_month_resolve_inclusively() {
        assert_eq!(
            resolve(&TimeReference::ThisMonth, today()),
            Some(DateRange::new(d(2024, 6, 1), d(2024, 6, 30)))
        );
        assert_eq!(
            resolve(&TimeReference::LastMonth, today()),
            Some(DateRange::new(d(2024, 5, 1), d(2024, 5, 31)))
        );
    }

    #[test]
    fn last_month_crosses_the_year_boundary() {
        assert_eq!(
            resolve(&TimeReference::LastMonth, d(2024, 1, 10)),
            Some(DateRange::new(d(2023, 12, 1), d(2023, 12, 31)))
        );
    }

    #[test]
    fn december_range_ends_on_the_31st() {
        assert_eq!(
            resolve(&TimeReference::Month { month: 12, year: Some(2023) }, today()),
            Some(DateRange::new(d(2023, 12, 1), d(2023, 12, 31)))
        );
    }

    #[test]
    fn february_respects_leap_years() {
        assert_eq!(
            resolve(&TimeReference::Month { month: 2, year: Some(2024) }, today()),
            Some(DateRange::new(d(2024, 2, 1), d(2024, 2, 29)))
        );
        assert_eq!(
            resolve(&TimeReference::Month { month: 2, year: Some(2023) }, today()),
            Some(DateRange::new(d(2023, 2, 1), d(2023, 2, 28)))
        );
    }

    #[test]
    fn bare_month_means_most_recent_occurrence() {
        // March has already happened this year; November has not.
        assert_eq!(
            resolve(&TimeReference::Month { month: 3, year: None }, today()),
            Some(DateRange::new(d(2024, 3, 1), d(2024, 3, 31)))
        );
        assert_eq!(
            resolve(&TimeReference::Month { month: 11, year: None }, today()),
            Some(DateRange::new(d(2023, 11, 1), d(2023, 11, 30)))
        );
    }

    #[test]
    fn year_references_span_the_whole_year() {
        assert_eq!(
            resolve(&TimeReference::ThisYear, today()),
            Some(DateRange::new(d(2024, 1, 1), d(2024, 12, 31)))
        );
        assert_eq!(
            resolve(&TimeReference::LastYear, today()),
            Some(DateRange::new(d(2023, 1, 1), d(2023, 12, 31)))
        );
        assert_eq!(
            resolve(&TimeReference::Year(2022), today()),
            Some(DateRange::new(d(2022, 1, 1), d(2022, 12, 31)))
        );
    }

    #[test]
    fn out_of_calendar_month_is_none() {
        assert_eq!(
            resolve(&TimeReference::Month { month: 13, year: Some(2024) }, today()),
            None
        );
    }

    #[test]
    fn phrases_parse_with_either_separator() {
        assert_eq!(parse_reference("this month"), Some(TimeReference::ThisMonth));
        assert_eq!(parse_reference("THIS_MONTH"), Some(TimeReference::ThisMonth));
        assert_eq!(parse_reference("previous month"), Some(TimeReference::LastMonth));
        assert_eq!(parse_reference("last_year"), Some(TimeReference::LastYear));
    }

    #[test]
    fn month_names_parse_with_and_without_a_year() {
        assert_eq!(
            parse_reference("March 2024"),
            Some(TimeReference::Month { month: 3, year: Some(2024) })
        );
        assert_eq!(
            parse_reference("march"),
            Some(TimeReference::Month { month: 3, year: None })
        );
        assert_eq!(
            parse_reference("sept 2023"),
            Some(TimeReference::Month { month: 9, year: Some(2023) })
        );
    }

    #[test]
    fn bare_years_parse_and_nonsense_does_not() {
        assert_eq!(parse_reference("2023"), Some(TimeReference::Year(2023)));
        assert_eq!(parse_reference("soon"), None);
        assert_eq!(parse_reference("1800"), None);
        assert_eq!(parse_reference(""), None);
    }
}
