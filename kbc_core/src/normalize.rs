//! Council date formats normalized to [`NaiveDate`].
//!
//! Two encodings appear in the wild: numeric `DD/MM/YYYY`, and a year-less
//! textual form such as `"Wed 15 January"` whose year has to be inferred.

use chrono::{Datelike, NaiveDate};
use regex::Regex;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse a numeric `DD/MM/YYYY` date appearing anywhere in `text`.
///
/// Invalid calendar dates (e.g. `31/02/2025`) yield `None`.
pub fn parse_numeric_date(text: &str) -> Option<NaiveDate> {
    let date_regex = Regex::new(r"(\d{2})/(\d{2})/(\d{4})").unwrap();
    let captures = date_regex.captures(text)?;
    NaiveDate::from_ymd_opt(
        captures[3].parse().ok()?,
        captures[2].parse().ok()?,
        captures[1].parse().ok()?,
    )
}

/// Parse a year-less textual date such as `"Wed 15 January"`.
///
/// The year is inferred on the assumption that schedules are forward-looking
/// within a rolling twelve-month window: a month earlier in the calendar than
/// `today`'s month falls in the next year, anything else in the current year.
pub fn parse_textual_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let date_regex = Regex::new(r"(\d{1,2})\s+([A-Za-z]+)").unwrap();
    let captures = date_regex.captures(text)?;
    let day: u32 = captures[1].parse().ok()?;
    let month = month_number(&captures[2])?;
    let year = if month < today.month() {
        today.year() + 1
    } else {
        today.year()
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .position(|month| *month == lower)
        .map(|index| index as u32 + 1)
}
