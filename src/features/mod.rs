//! Statistical feature extraction from aggregation windows.

mod extractor;
pub mod stats;

pub use crate::schema::{FeatureField, FeatureVector};
pub use extractor::FeatureExtractor;

use crate::schema::AggregationWindow;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// RFC 3339 time the vector was produced.
pub const METADATA_EXTRACTION_TIMESTAMP: &str = "extraction_timestamp";
/// Raw record count of the source window.
pub const METADATA_WINDOW_LOG_COUNT: &str = "window_log_count";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeatureExtractionError {
    #[error("window {service}@{window_start}: {reason}")]
    InvariantViolation {
        service: String,
        window_start: DateTime<Utc>,
        reason: String,
    },
}

impl FeatureExtractionError {
    pub(crate) fn violation(window: &AggregationWindow, reason: String) -> Self {
        FeatureExtractionError::InvariantViolation {
            service: window.service().to_string(),
            window_start: window.window_start(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_record;
    use crate::parse::ParsedFields;
    use crate::schema::{LogRecord, Provenance, SourceFormat};
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn record(ts: &str, service: &str, level: &str, message: &str, duration: Option<f64>, code: Option<&str>) -> LogRecord {
        let mut p = ParsedFields::new(Provenance {
            source: "t".into(),
            index: 1,
            format: SourceFormat::Json,
        });
        p.timestamp = Some(json!(ts));
        p.level = Some(level.into());
        p.service = Some(service.into());
        p.message = Some(message.into());
        p.duration = duration.map(Value::from);
        p.error_code = code.map(str::to_string);
        normalize_record(p).unwrap()
    }

    fn window(records: Vec<LogRecord>) -> AggregationWindow {
        let start = Utc.with_ymd_and_hms(2025, 2, 7, 10, 30, 0).unwrap();
        let mut w = AggregationWindow::new(start, 300, "api");
        for r in records {
            w.push(r);
        }
        w
    }

    fn pinned() -> FeatureExtractor {
        FeatureExtractor::at(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn counts_rates_and_diversity() {
        let w = window(vec![
            record("2025-02-07T10:30:01Z", "api", "ERROR", "boom", None, Some("E1")),
            record("2025-02-07T10:30:02Z", "api", "CRITICAL", "boom", None, Some("E1")),
            record("2025-02-07T10:30:03Z", "api", "WARN", "slow", None, Some("E2")),
            record("2025-02-07T10:30:04Z", "api", "INFO", "ok", None, None),
            record("2025-02-07T10:30:05Z", "api", "DEBUG", "trace", None, None),
        ]);
        let v = pinned().extract(&w).unwrap();
        assert_eq!(v.total_events, 5);
        assert_eq!(v.error_count, 2);
        assert_eq!(v.warning_count, 1);
        assert_eq!(v.info_count, 1);
        assert!(v.error_count + v.warning_count + v.info_count <= v.total_events);
        assert_eq!(v.error_rate, 0.4);
        assert_eq!(v.warning_rate, 0.2);
        assert_eq!(v.unique_messages, 4);
        assert_eq!(v.unique_error_codes, 2);
        assert!(v.median_duration_ms.is_none() && v.p95_duration_ms.is_none() && v.max_duration_ms.is_none());
    }

    #[test]
    fn duration_statistics() {
        let records = (1..=10)
            .map(|i| {
                record(
                    &format!("2025-02-07T10:31:{:02}Z", i),
                    "api",
                    "INFO",
                    "req",
                    Some(i as f64 * 10.0),
                    None,
                )
            })
            .collect();
        let v = pinned().extract(&window(records)).unwrap();
        assert_eq!(v.median_duration_ms, Some(55.0));
        assert_eq!(v.p95_duration_ms, Some(100.0));
        assert_eq!(v.max_duration_ms, Some(100.0));
    }

    #[test]
    fn empty_window_is_safe() {
        let v = pinned().extract(&window(Vec::new())).unwrap();
        assert_eq!(v.total_events, 0);
        assert_eq!(v.error_rate, 0.0);
        assert_eq!(v.warning_rate, 0.0);
        assert!(v.max_duration_ms.is_none());
        assert_eq!(v.metadata[METADATA_WINDOW_LOG_COUNT], json!(0));
    }

    #[test]
    fn metadata_uses_the_pinned_stamp() {
        let v = pinned().extract(&window(Vec::new())).unwrap();
        assert_eq!(v.metadata[METADATA_EXTRACTION_TIMESTAMP], json!("2025-03-01T00:00:00.000000Z"));
    }

    #[test]
    fn foreign_records_are_rejected() {
        let outside = window(vec![record("2025-02-07T10:35:00Z", "api", "INFO", "late", None, None)]);
        let other = window(vec![record("2025-02-07T10:31:00Z", "db", "INFO", "x", None, None)]);
        let extractor = pinned();
        assert!(matches!(
            extractor.extract(&outside),
            Err(FeatureExtractionError::InvariantViolation { .. })
        ));

        let good = window(vec![record("2025-02-07T10:31:00Z", "api", "INFO", "x", None, None)]);
        let (vectors, skipped) = extractor.extract_batch([&outside, &good, &other]);
        assert_eq!(vectors.len(), 1);
        assert_eq!(skipped, 2);
    }
}
