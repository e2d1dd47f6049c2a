//! Recency scoring from timestamp metadata.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, trace};

use crate::document::Document;

/// Score used when a document carries no usable timestamp.
pub const NEUTRAL_FRESHNESS_SCORE: f32 = 0.7;

/// Metadata keys searched for a timestamp, in priority order.
pub const TIMESTAMP_KEYS: [&str; 3] = ["updated_at", "created_at", "timestamp"];

/// Epoch values at or above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a metadata value as a UTC timestamp.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
/// (both read as UTC, optional fractional seconds), `YYYY-MM-DD`, and epoch
/// seconds or milliseconds given as a JSON number or a numeric string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    s.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        DateTime::from_timestamp(value as i64, 0)
    }
}

/// Find the document's timestamp, trying each of [`TIMESTAMP_KEYS`] in turn.
pub fn document_timestamp(document: &Document) -> Option<DateTime<Utc>> {
    for key in TIMESTAMP_KEYS {
        let Some(value) = document.metadata.get(key).filter(|v| !v.is_null()) else {
            continue;
        };
        match parse_timestamp(value) {
            Some(ts) => return Some(ts),
            None => debug!(key, %value, "unparsable timestamp metadata"),
        }
    }
    None
}

/// Map an age in days onto the freshness buckets.
pub fn freshness_for_age_days(days: f64) -> f32 {
    match days {
        d if d <= 7.0 => 1.0,
        d if d <= 30.0 => 0.9,
        d if d <= 90.0 => 0.8,
        d if d <= 180.0 => 0.7,
        d if d <= 365.0 => 0.6,
        _ => 0.5,
    }
}

/// Score a document's recency relative to `now`.
///
/// Future timestamps count as brand new. Documents without a parsable
/// timestamp get [`NEUTRAL_FRESHNESS_SCORE`].
pub fn freshness_score(document: &Document, now: DateTime<Utc>) -> f32 {
    let Some(ts) = document_timestamp(document) else {
        trace!("no timestamp metadata, using neutral freshness");
        return NEUTRAL_FRESHNESS_SCORE;
    };
    let days = (now - ts).num_seconds().max(0) as f64 / 86_400.0;
    freshness_for_age_days(days)
}
