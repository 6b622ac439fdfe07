//! Publication date parsing for provider results and page metadata.
//!
//! Providers report dates in whatever form their index has: RFC 3339,
//! naive ISO timestamps, "Mar 3, 2024", or relative phrases like
//! "3 days ago". Anything unrecognized is treated as unknown.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

static RELATIVE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s+(minute|min|hour|day|week|month|year)s?\s+ago$").ok());

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%d %b %Y"];

/// Parse an absolute or relative date, resolving relative ones against `now`.
pub fn parse_date_at(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(at.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|at| at.and_utc());
        }
    }

    parse_relative(raw, now)
}

/// Parse a date relative to the current time.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_date_at(raw, Utc::now())
}

fn parse_relative(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = RELATIVE.as_ref()?.captures(raw)?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let span = match caps.get(2)?.as_str().to_lowercase().as_str() {
        "minute" | "min" => Duration::minutes(amount),
        "hour" => Duration::hours(amount),
        "day" => Duration::days(amount),
        "week" => Duration::weeks(amount),
        "month" => Duration::days(amount * 30),
        "year" => Duration::days(amount * 365),
        _ => return None,
    };
    now.checked_sub_signed(span)
}
