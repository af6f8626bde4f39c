//! Timestamp coercion to UTC with microsecond precision.

use super::NormalizationError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Epoch values below this (year 3000 in seconds) are seconds; above are milliseconds.
pub const EPOCH_MILLIS_THRESHOLD: f64 = 32_503_680_000.0;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// ISO string, epoch number, or numeric string → UTC instant.
pub fn normalize_timestamp(value: &Value) -> Result<DateTime<Utc>, NormalizationError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(from_epoch)
            .ok_or_else(|| invalid(&n.to_string())),
        Value::String(s) => parse_str(s),
        other => Err(invalid(&other.to_string())),
    }
}

fn invalid(value: &str) -> NormalizationError {
    NormalizationError::InvalidTimestamp(value.to_string())
}

fn parse_str(raw: &str) -> Result<DateTime<Utc>, NormalizationError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(invalid(raw));
    }
    if let Ok(epoch) = s.parse::<f64>() {
        return from_epoch(epoch).ok_or_else(|| invalid(raw));
    }

    let s = s.to_ascii_uppercase();
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(truncate_to_micros(dt.with_timezone(&Utc)));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Ok(truncate_to_micros(dt.with_timezone(&Utc)));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Ok(truncate_to_micros(dt.and_utc()));
        }
    }
    Err(invalid(raw))
}

/// Seconds or milliseconds since the epoch, rounded to the microsecond.
fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let micros = if value.abs() < EPOCH_MILLIS_THRESHOLD {
        (value * 1_000_000.0).round()
    } else {
        (value * 1_000.0).round()
    };
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

/// Sub-microsecond digits are dropped so every input path lands on the same grid.
fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    let micros = dt.timestamp_micros();
    DateTime::from_timestamp_micros(micros).unwrap_or(dt)
}
