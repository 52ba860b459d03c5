//! Shared date parsing.
//!
//! Operators write dates every way imaginable: ISO, dotted day-first,
//! slashed, and with Russian or English month names. Everything here
//! returns `None` rather than guessing when a value does not parse.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

/// Regex source matching a date-shaped token, for embedding in larger
/// patterns.
pub const DATE_TOKEN: &str = r"(?i:\b(?:\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[./-]\d{1,2}[./-]\d{2,4}|\d{1,2}\s+(?:янв|фев|мар|апр|ма[йя]|июн|июл|авг|сен|окт|ноя|дек|jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\p{L}*\.?(?:\s+\d{4})?|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?(?:,?\s+\d{4})?))";

static DATE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DATE_TOKEN).expect("valid regex"));

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,4})([./-])(\d{1,2})[./-](\d{1,4})(?:\D|$)").expect("valid regex")
});

/// `4 декабря 2025`, `4 Dec 2025`, `4 дек.`
static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s+(\p{L}{3,})\.?,?(?:\s+(\d{4}))?").expect("valid regex")
});

/// `December 4, 2025`, `Dec 4th`
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{3,})\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?")
        .expect("valid regex")
});

/// Month-name prefixes. `мар` must precede `ма`-prefixed May forms.
const MONTH_PREFIXES: &[(&str, u32)] = &[
    ("янв", 1),
    ("фев", 2),
    ("мар", 3),
    ("апр", 4),
    ("мая", 5),
    ("май", 5),
    ("июн", 6),
    ("июл", 7),
    ("авг", 8),
    ("сен", 9),
    ("окт", 10),
    ("ноя", 11),
    ("дек", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Maps a month word (any case, any inflection) to its number.
#[must_use]
pub fn month_from_name(word: &str) -> Option<u32> {
    let word = word.to_lowercase();
    MONTH_PREFIXES
        .iter()
        .find(|(prefix, _)| word.starts_with(*prefix))
        .map(|&(_, month)| month)
}

fn expand_year(year: u32) -> Option<i32> {
    let year = i32::try_from(year).ok()?;
    match year {
        0..=99 => Some(2000 + year),
        1900..=2999 => Some(year),
        _ => None,
    }
}

fn parse_numeric(s: &str) -> Option<NaiveDate> {
    let caps = NUMERIC_DATE.captures(s)?;
    let first = &caps[1];
    let separator = &caps[2];
    let a: u32 = first.parse().ok()?;
    let b: u32 = caps[3].parse().ok()?;
    let c: u32 = caps[4].parse().ok()?;

    if first.len() == 4 {
        return NaiveDate::from_ymd_opt(i32::try_from(a).ok()?, b, c);
    }

    let year = expand_year(c)?;
    // Slashed dates are day-first unless that cannot be right.
    if separator == "/" && b > 12 && a <= 12 {
        NaiveDate::from_ymd_opt(year, a, b)
    } else {
        NaiveDate::from_ymd_opt(year, b, a)
    }
}

fn parse_month_name(s: &str, reference_year: i32) -> Option<NaiveDate> {
    let (day, month, year) = if let Some(caps) = DAY_MONTH.captures(s) {
        (
            caps[1].parse::<u32>().ok()?,
            month_from_name(&caps[2])?,
            caps.get(3),
        )
    } else {
        let caps = MONTH_DAY.captures(s)?;
        (
            caps[2].parse::<u32>().ok()?,
            month_from_name(&caps[1])?,
            caps.get(3),
        )
    };

    let year = match year {
        Some(m) => i32::try_from(m.as_str().parse::<u32>().ok()?).ok()?,
        None => reference_year,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a date in any supported notation. A month-name date without a
/// year takes `reference_year`.
#[must_use]
pub fn parse_date(s: &str, reference_year: i32) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(dt) = parse_datetime_exact(s) {
        return Some(dt.date_naive());
    }
    parse_numeric(s).or_else(|| parse_month_name(s, reference_year))
}

fn parse_datetime_exact(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parses a timestamp, accepting a bare date as midnight UTC.
#[must_use]
pub fn parse_datetime(s: &str, reference_year: i32) -> Option<DateTime<Utc>> {
    let s = s.trim();
    parse_datetime_exact(s).or_else(|| {
        parse_date(s, reference_year)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Finds the first date-shaped token in free text that actually parses.
#[must_use]
pub fn find_date(text: &str, reference_year: i32) -> Option<(NaiveDate, &str)> {
    DATE_TOKEN_RE.find_iter(text).find_map(|m| {
        parse_date(m.as_str(), reference_year).map(|date| (date, m.as_str()))
    })
}

/// Formats a date the way parsed items carry it.
#[must_use]
pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
