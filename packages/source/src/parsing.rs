//! Shared parsing utilities for hazard feeds.
//!
//! Raw feeds are loosely typed: the same field may arrive as a JSON string,
//! number, or not at all. These helpers coerce values and parse the date
//! formats seen across feeds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Returns a field as trimmed, non-empty text.
///
/// Numbers and booleans are converted to their string form, so a numeric
/// fire id of `1234` is read as `"1234"`.
#[must_use]
pub fn field_text(record: &serde_json::Value, field: &str) -> Option<String> {
    match record.get(field)? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Returns a field as a finite `f64`, parsing string values.
#[must_use]
pub fn field_f64(record: &serde_json::Value, field: &str) -> Option<f64> {
    let value = match record.get(field)? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Parses a registry report date.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (with optional fraction),
/// `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD`, and `YYYYMMDD`. Naive values are
/// taken as UTC.
#[must_use]
pub fn parse_report_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    parse_date(s).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Parses `YYYY-MM-DD` or `YYYYMMDD`.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let format = if s.contains('-') { "%Y-%m-%d" } else { "%Y%m%d" };
    NaiveDate::parse_from_str(s, format).ok()
}

/// Parses a satellite acquisition time from its date and time fields.
///
/// `time` is `HHMM`, zero-padded on the left when shorter (`"5"` is
/// 00:05), or `HH:MM`. A missing time means midnight.
#[must_use]
pub fn parse_acquisition(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = parse_date(date)?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        None => NaiveTime::MIN,
        Some(t) if t.contains(':') => NaiveTime::parse_from_str(t, "%H:%M").ok()?,
        Some(t) => {
            if t.len() > 4 || !t.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            NaiveTime::parse_from_str(&format!("{t:0>4}"), "%H%M").ok()?
        }
    };
    Some(date.and_time(time).and_utc())
}

/// Parses an alert timestamp (`...Z` or any RFC 3339 offset).
#[must_use]
pub fn parse_alert_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Applies `parse` to `raw`, falling back to `now` with a warning.
pub fn parse_or_now(
    raw: Option<&str>,
    parse: fn(&str) -> Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    context: &str,
) -> DateTime<Utc> {
    match raw {
        Some(s) => parse(s).unwrap_or_else(|| {
            log::warn!("{context}: unparsable date {s:?}, using current time");
            now
        }),
        None => now,
    }
}
