//! Window → feature vector.

use super::stats::{median_sorted, percentile_nearest_rank, sorted_finite};
use super::{FeatureExtractionError, METADATA_EXTRACTION_TIMESTAMP, METADATA_WINDOW_LOG_COUNT};
use crate::config::PipelineConfig;
use crate::schema::{AggregationWindow, FeatureVector, Severity};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Computes feature vectors. Holds a single extraction stamp, so every vector
/// it produces carries the same `extraction_timestamp`.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    extracted_at: DateTime<Utc>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    /// Stamp with the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Stamp with a fixed time; output is then fully reproducible.
    pub fn at(extracted_at: DateTime<Utc>) -> Self {
        Self { extracted_at }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        config.extraction_timestamp.map_or_else(Self::new, Self::at)
    }

    pub fn extracted_at(&self) -> DateTime<Utc> {
        self.extracted_at
    }

    fn check_membership(&self, window: &AggregationWindow) -> Result<(), FeatureExtractionError> {
        let (start, end) = (window.window_start(), window.window_end());
        for r in window.records() {
            if r.service() != window.service() {
                return Err(FeatureExtractionError::violation(
                    window,
                    format!("record {} belongs to service {}", r.provenance(), r.service()),
                ));
            }
            if r.timestamp() < start || r.timestamp() >= end {
                return Err(FeatureExtractionError::violation(
                    window,
                    format!("record {} at {} is outside the window", r.provenance(), r.timestamp()),
                ));
            }
        }
        Ok(())
    }

    pub fn extract(&self, window: &AggregationWindow) -> Result<FeatureVector, FeatureExtractionError> {
        self.check_membership(window)?;
        let records = window.records();

        let (mut errors, mut warnings, mut infos) = (0u64, 0u64, 0u64);
        let mut hashes = HashSet::new();
        let mut codes = HashSet::new();
        for r in records {
            match r.severity() {
                Severity::Error | Severity::Critical => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info => infos += 1,
                Severity::Debug => {}
            }
            hashes.insert(r.message_hash());
            if let Some(code) = r.error_code() {
                codes.insert(code);
            }
        }

        let total = records.len() as u64;
        let rate = |count: u64| if total == 0 { 0.0 } else { count as f64 / total as f64 };

        let durations = sorted_finite(records.iter().filter_map(|r| r.duration_ms()));

        let mut metadata = BTreeMap::new();
        metadata.insert(
            METADATA_EXTRACTION_TIMESTAMP.to_string(),
            Value::String(self.extracted_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        metadata.insert(METADATA_WINDOW_LOG_COUNT.to_string(), Value::from(total));

        Ok(FeatureVector {
            window_start: window.window_start(),
            service: window.service().to_string(),
            total_events: total,
            error_count: errors,
            warning_count: warnings,
            info_count: infos,
            error_rate: rate(errors),
            warning_rate: rate(warnings),
            median_duration_ms: median_sorted(&durations),
            p95_duration_ms: percentile_nearest_rank(&durations, 95),
            max_duration_ms: durations.last().copied(),
            unique_messages: hashes.len() as u64,
            unique_error_codes: codes.len() as u64,
            metadata,
            annotations: BTreeMap::new(),
        })
    }

    /// Extract every window in order. Returns (vectors, skipped).
    pub fn extract_batch<'a, I>(&self, windows: I) -> (Vec<FeatureVector>, usize)
    where
        I: IntoIterator<Item = &'a AggregationWindow>,
    {
        let mut vectors = Vec::new();
        let mut skipped = 0;
        for window in windows {
            match self.extract(window) {
                Ok(v) => vectors.push(v),
                Err(e) => {
                    warn!(service = window.service(), window_start = %window.window_start(), error = %e, "skipping window");
                    skipped += 1;
                }
            }
        }
        (vectors, skipped)
    }
}
