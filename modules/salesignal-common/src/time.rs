//! Timestamp normalization across sources.
//!
//! Everything is reduced to a UTC instant. Formats are tried in a fixed
//! order (epoch numbers, the X/Twitter text layout, then ISO-8601 variants)
//! and the first successful parse wins. Values without a zone are UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Epoch magnitudes at or above this are milliseconds (year ~5138 in seconds).
const MILLIS_THRESHOLD: f64 = 1e11;

/// `Wed Oct 10 20:19:24 +0000 2018`
const PLATFORM_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Offset forms `parse_from_rfc3339` rejects: basic `+0000` offsets, a space
/// separator, and minute precision.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized timestamp: {0}")]
pub struct NormalizationError(pub String);

/// Normalize a loosely typed JSON value (number, string, or null).
pub fn normalize(value: &Value) -> Result<DateTime<Utc>, NormalizationError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                from_epoch_int(i)
            } else if let Some(f) = n.as_f64() {
                from_epoch_float(f)
            } else {
                Err(NormalizationError(n.to_string()))
            }
        }
        Value::String(s) => normalize_str(s),
        other => Err(NormalizationError(other.to_string())),
    }
}

pub fn normalize_str(raw: &str) -> Result<DateTime<Utc>, NormalizationError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(NormalizationError(raw.to_string()));
    }

    if let Ok(i) = s.parse::<i64>() {
        return from_epoch_int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return from_epoch_float(f);
    }

    if let Ok(dt) = DateTime::parse_from_str(s, PLATFORM_FORMAT) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    let bare = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(bare, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(bare, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(NormalizationError(raw.to_string()))
}

/// Canonical string form: RFC 3339, second precision, `Z` suffix.
pub fn canonical(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn from_epoch_int(i: i64) -> Result<DateTime<Utc>, NormalizationError> {
    let parsed = if (i as f64).abs() >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(i)
    } else {
        DateTime::from_timestamp(i, 0)
    };
    parsed.ok_or_else(|| NormalizationError(i.to_string()))
}

fn from_epoch_float(f: f64) -> Result<DateTime<Utc>, NormalizationError> {
    if !f.is_finite() {
        return Err(NormalizationError(f.to_string()));
    }
    let millis = if f.abs() >= MILLIS_THRESHOLD { f } else { f * 1000.0 };
    DateTime::from_timestamp_millis(millis.round() as i64)
        .ok_or_else(|| NormalizationError(f.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 18, 54, 23).unwrap()
    }

    #[test]
    fn epoch_seconds_and_millis_agree() {
        assert_eq!(normalize(&json!(1718045663)).unwrap(), expected());
        assert_eq!(normalize(&json!(1718045663000_i64)).unwrap(), expected());
        assert_eq!(normalize(&json!(1718045663.0)).unwrap(), expected());
        assert_eq!(normalize(&json!("1718045663")).unwrap(), expected());
    }

    #[test]
    fn platform_text_format() {
        assert_eq!(
            normalize_str("Mon Jun 10 18:54:23 +0000 2024").unwrap(),
            expected()
        );
    }

    #[test]
    fn iso_variants() {
        assert_eq!(normalize_str("2024-06-10T18:54:23Z").unwrap(), expected());
        assert_eq!(normalize_str("2024-06-10T18:54:23.000Z").unwrap(), expected());
        assert_eq!(normalize_str("2024-06-10T20:54:23+02:00").unwrap(), expected());
        assert_eq!(normalize_str("2024-06-10T18:54:23").unwrap(), expected());
        assert_eq!(normalize_str("2024-06-10 18:54:23").unwrap(), expected());
        assert_eq!(
            normalize_str("2024-06-10").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn basic_and_minute_precision_offsets() {
        assert_eq!(normalize_str("2024-06-10T18:54:23+0000").unwrap(), expected());
        assert_eq!(normalize_str("2024-06-10T20:54:23.000+0200").unwrap(), expected());
        assert_eq!(normalize_str("2024-06-10 18:54:23+00:00").unwrap(), expected());
        assert_eq!(
            normalize_str("2024-06-10T18:54+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 16, 54, 0).unwrap()
        );
        assert_eq!(
            normalize_str("2024-06-10T18:54-0500").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 23, 54, 0).unwrap()
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(normalize_str("yesterday-ish").is_err());
        assert!(normalize_str("   ").is_err());
        assert!(normalize(&Value::Null).is_err());
        assert!(normalize(&json!({"ts": 1})).is_err());
    }

    #[test]
    fn canonical_is_second_precision_utc() {
        let t = Utc.timestamp_millis_opt(1718045663789).unwrap();
        assert_eq!(canonical(&t), "2024-06-10T18:54:23Z");
    }
}
