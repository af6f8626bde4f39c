//! Cross-window summary statistics for one feature, and a simple
//! "more than k × mean" deviation finder. This is a descriptive helper,
//! not an anomaly detector.

use crate::features::stats::{mean, median_sorted, sample_stdev, sorted_finite};
use crate::schema::{FeatureField, FeatureVector, UnknownFeatureField};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BaselineError {
    #[error("no data for feature {0}")]
    NoData(FeatureField),

    #[error("unknown feature field: {0}")]
    UnknownField(String),
}

impl From<UnknownFeatureField> for BaselineError {
    fn from(e: UnknownFeatureField) -> Self {
        BaselineError::UnknownField(e.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub field: FeatureField,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for a single value
    pub stdev: f64,
}

/// Statistics over every vector that has a value for `field`.
pub fn baseline(vectors: &[FeatureVector], field: FeatureField) -> Result<BaselineStats, BaselineError> {
    let values: Vec<f64> = vectors.iter().filter_map(|v| v.get(field)).collect();
    let sorted = sorted_finite(values.iter().copied());
    let no_data = || BaselineError::NoData(field);

    Ok(BaselineStats {
        field,
        count: sorted.len(),
        min: *sorted.first().ok_or_else(no_data)?,
        max: *sorted.last().ok_or_else(no_data)?,
        mean: mean(&sorted).ok_or_else(no_data)?,
        median: median_sorted(&sorted).ok_or_else(no_data)?,
        stdev: sample_stdev(&sorted).ok_or_else(no_data)?,
    })
}

/// Like [`baseline`], with the field given by name.
pub fn baseline_by_name(vectors: &[FeatureVector], field: &str) -> Result<BaselineStats, BaselineError> {
    baseline(vectors, field.parse::<FeatureField>()?)
}

/// Indices of vectors whose `stats.field` exceeds `multiplier × stats.mean`.
pub fn deviations(vectors: &[FeatureVector], stats: &BaselineStats, multiplier: f64) -> Vec<usize> {
    let field = stats.field;
    let threshold = stats.mean * multiplier;
    vectors
        .iter()
        .enumerate()
        .filter(|(_, v)| v.get(field).is_some_and(|x| x > threshold))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn vector(error_rate: f64, p95: Option<f64>) -> FeatureVector {
        FeatureVector {
            window_start: Utc.with_ymd_and_hms(2025, 2, 7, 10, 30, 0).unwrap(),
            service: "api".into(),
            total_events: 10,
            error_count: (error_rate * 10.0) as u64,
            warning_count: 0,
            info_count: 0,
            error_rate,
            warning_rate: 0.0,
            median_duration_ms: p95,
            p95_duration_ms: p95,
            max_duration_ms: p95,
            unique_messages: 1,
            unique_error_codes: 0,
            metadata: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    #[test]
    fn summary_statistics() {
        let vectors = vec![vector(0.1, None), vector(0.2, Some(50.0)), vector(0.3, None), vector(0.4, Some(70.0))];
        let s = baseline(&vectors, FeatureField::ErrorRate).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.min, 0.1);
        assert_eq!(s.max, 0.4);
        assert!((s.mean - 0.25).abs() < 1e-12);
        assert!((s.median - 0.25).abs() < 1e-12);
        assert!((s.stdev - 0.129099444).abs() < 1e-6);

        let p = baseline(&vectors, FeatureField::P95DurationMs).unwrap();
        assert_eq!(p.count, 2);
        assert_eq!(p.mean, 60.0);
    }

    #[test]
    fn single_value_has_zero_stdev() {
        let s = baseline(&[vector(0.5, None)], FeatureField::ErrorRate).unwrap();
        assert_eq!(s.stdev, 0.0);
        assert_eq!(s.median, 0.5);
    }

    #[test]
    fn errors() {
        let vectors = vec![vector(0.1, None)];
        assert_eq!(
            baseline(&vectors, FeatureField::MaxDurationMs),
            Err(BaselineError::NoData(FeatureField::MaxDurationMs))
        );
        assert_eq!(
            baseline_by_name(&vectors, "latency"),
            Err(BaselineError::UnknownField("latency".into()))
        );
        assert!(baseline_by_name(&vectors, "error_rate").is_ok());
    }

    #[test]
    fn finds_deviations() {
        let vectors = vec![vector(0.1, None), vector(0.1, None), vector(0.1, None), vector(0.9, None)];
        let s = baseline(&vectors, FeatureField::ErrorRate).unwrap();
        assert_eq!(deviations(&vectors, &s, 2.0), vec![3]);
        assert!(deviations(&vectors, &s, 10.0).is_empty());
    }
}
