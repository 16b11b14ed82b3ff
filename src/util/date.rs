use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Errors from [`normalize_date`]. Callers drop the entry on either variant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("empty date string")]
    Empty,
    #[error("unrecognized date format: {0}")]
    Unrecognized(String),
}

/// Layouts with an explicit numeric offset, tried after RFC 3339 and RFC 2822.
///
/// `%z` accepts both `+0300` and `+03:00`; `%a`/`%b` accept short and long names.
const OFFSET_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%d %b %y %H:%M:%S %z",
    "%d %b %y %H:%M %z",
    "%a %b %d %H:%M:%S %z %Y",
];

/// Layouts without any zone; interpreted as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Zone abbreviations seen in the wild that RFC 2822 parsers reject.
const ZONE_OFFSETS: &[(&str, &str)] = &[
    ("UTC", "+0000"),
    ("Z", "+0000"),
    ("GMT", "+0000"),
    ("UT", "+0000"),
    ("WET", "+0000"),
    ("WEST", "+0100"),
    ("BST", "+0100"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("EET", "+0200"),
    ("EEST", "+0300"),
    ("MSK", "+0300"),
    ("IST", "+0530"),
    ("HKT", "+0800"),
    ("SGT", "+0800"),
    ("JST", "+0900"),
    ("KST", "+0900"),
    ("AEST", "+1000"),
    ("AEDT", "+1100"),
    ("NZST", "+1200"),
    ("NZDT", "+1300"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("AKST", "-0900"),
    ("AKDT", "-0800"),
    ("HST", "-1000"),
];

/// Parses a feed-supplied date into a UTC instant.
///
/// Tries RFC 3339, RFC 2822 (which covers RFC 1123 and RFC 822, with named or
/// numeric zones), then a list of common non-standard layouts. Two repairs are
/// attempted before giving up: replacing a named zone the strict parsers do not
/// know (e.g. `CEST`) with its numeric offset, and dropping a leading weekday
/// that disagrees with the date.
///
/// # Errors
///
/// [`DateError::Empty`] for blank input, [`DateError::Unrecognized`] when no
/// layout matches. There is no fallback instant: an entry without a parsable
/// date must be dropped.
///
/// # Examples
///
/// ```
/// use newsdesk::util::normalize_date;
///
/// let t = normalize_date("Mon, 02 Jan 2006 15:04:05 +0000").unwrap();
/// assert_eq!(t.to_rfc3339(), "2006-01-02T15:04:05+00:00");
/// assert!(normalize_date("").is_err());
/// ```
pub fn normalize_date(raw: &str) -> Result<DateTime<Utc>, DateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateError::Empty);
    }

    let zoned = with_numeric_zone(trimmed);
    let candidates = [
        Some(trimmed),
        zoned.as_deref(),
        without_weekday(trimmed),
        zoned.as_deref().and_then(without_weekday),
    ];

    let parsed = candidates.into_iter().flatten().find_map(parse_known_layout);
    parsed.ok_or_else(|| DateError::Unrecognized(trimmed.to_owned()))
}

fn parse_known_layout(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(s, layout) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Replaces a trailing zone abbreviation with its numeric offset.
fn with_numeric_zone(s: &str) -> Option<String> {
    let (head, zone) = s.rsplit_once(' ')?;
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let upper = zone.to_ascii_uppercase();
    ZONE_OFFSETS
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, offset)| format!("{} {}", head.trim_end(), offset))
}

/// Drops a leading `Mon,`-style weekday.
fn without_weekday(s: &str) -> Option<&str> {
    let (head, rest) = s.split_once(',')?;
    if head.is_empty() || !head.trim().chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(rest.trim_start())
}
