//! Aggregation: bucket canonical records into calendar-aligned windows per service.

use crate::schema::{AggregationWindow, LogRecord, WindowKey};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use thiserror::Error;
use tracing::{debug, warn};

/// Windows keyed by (start, service). Iteration order is (start, service).
pub type Windows = BTreeMap<WindowKey, AggregationWindow>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("window size must be positive and fit the supported time range, got {0}")]
    InvalidWindowSize(i64),

    #[error("window of {window_size_seconds}s containing {timestamp} falls outside the supported time range")]
    OutOfRange {
        timestamp: DateTime<Utc>,
        window_size_seconds: i64,
    },
}

/// Window length as a `TimeDelta`. The size must be positive and a window
/// starting at the Unix epoch must end at a representable instant.
pub fn window_size(window_size_seconds: i64) -> Result<TimeDelta, AggregationError> {
    let invalid = AggregationError::InvalidWindowSize(window_size_seconds);
    if window_size_seconds <= 0 {
        return Err(invalid);
    }
    let size = TimeDelta::try_seconds(window_size_seconds).ok_or_else(|| invalid.clone())?;
    DateTime::<Utc>::from_timestamp(0, 0)
        .and_then(|epoch| epoch.checked_add_signed(size))
        .ok_or(invalid)?;
    Ok(size)
}

/// `[start, end)` of the window containing `ts`, with `start = floor(epoch / w) * w`.
pub fn window_bounds(
    ts: DateTime<Utc>,
    window_size_seconds: i64,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AggregationError> {
    let size = window_size(window_size_seconds)?;
    let out_of_range = || AggregationError::OutOfRange {
        timestamp: ts,
        window_size_seconds,
    };
    let start = ts
        .timestamp()
        .div_euclid(window_size_seconds)
        .checked_mul(window_size_seconds)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(out_of_range)?;
    let end = start.checked_add_signed(size).ok_or_else(out_of_range)?;
    Ok((start, end))
}

/// Start of the window containing `ts`: `floor(epoch / w) * w`. Fails when
/// that window does not fit the supported time range.
pub fn align_to_window(ts: DateTime<Utc>, window_size_seconds: i64) -> Result<DateTime<Utc>, AggregationError> {
    window_bounds(ts, window_size_seconds).map(|(start, _)| start)
}

/// Group records into windows. Each window's records end up in chronological
/// order; records with equal timestamps keep their input order. Records whose
/// window cannot be represented are dropped with a warning; callers see them
/// as the difference between records in and `log_count` totals out.
pub fn aggregate<I>(records: I, window_size_seconds: i64) -> Result<Windows, AggregationError>
where
    I: IntoIterator<Item = LogRecord>,
{
    window_size(window_size_seconds)?;
    let mut windows = Windows::new();
    let mut total = 0usize;
    let mut dropped = 0usize;
    for record in records {
        let window_start = match align_to_window(record.timestamp(), window_size_seconds) {
            Ok(start) => start,
            Err(e) => {
                warn!(source = %record.provenance(), error = %e, "dropping record");
                dropped += 1;
                continue;
            }
        };
        let key = WindowKey {
            window_start,
            service: record.service().to_string(),
        };
        windows
            .entry(key)
            .or_insert_with_key(|k| AggregationWindow::new(k.window_start, window_size_seconds, k.service.clone()))
            .push(record);
        total += 1;
    }
    for window in windows.values_mut() {
        window.sort_chronologically();
    }
    debug!(records = total, dropped, windows = windows.len(), window_size_seconds, "aggregated");
    Ok(windows)
}

/// Distinct services, sorted.
pub fn services(windows: &Windows) -> BTreeSet<String> {
    windows.keys().map(|k| k.service.clone()).collect()
}

/// (earliest start, latest end), or `None` when there are no windows.
pub fn time_range(windows: &Windows) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let min_start = windows.values().map(AggregationWindow::window_start).min()?;
    let max_end = windows.values().map(AggregationWindow::window_end).max()?;
    Some((min_start, max_end))
}

pub fn filter_by_service<'a>(
    windows: &'a Windows,
    service: &'a str,
) -> impl Iterator<Item = &'a AggregationWindow> + 'a {
    windows.values().filter(move |w| w.service() == service)
}

/// Windows whose start lies in `[start, end)`.
pub fn filter_by_time(
    windows: &Windows,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> impl Iterator<Item = &AggregationWindow> + '_ {
    windows
        .values()
        .filter(move |w| start <= w.window_start() && w.window_start() < end)
}

/// Windows ordered by (start, service).
pub fn into_sorted(windows: Windows) -> Vec<AggregationWindow> {
    windows.into_values().collect()
}

/// Windows grouped by start time; each group ordered by service.
pub fn group_by_time(windows: Windows) -> BTreeMap<DateTime<Utc>, Vec<AggregationWindow>> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<AggregationWindow>> = BTreeMap::new();
    for (key, window) in windows {
        groups.entry(key.window_start).or_default().push(window);
    }
    groups
}

/// Human-readable overview: totals, per-service counts, time range.
pub fn summary(windows: &Windows) -> String {
    if windows.is_empty() {
        return "No windows".to_string();
    }
    let total: usize = windows.values().map(AggregationWindow::log_count).sum();
    let mut per_service: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for w in windows.values() {
        let entry = per_service.entry(w.service()).or_default();
        entry.0 += 1;
        entry.1 += w.log_count();
    }

    let mut out = format!("Aggregated {} logs into {} windows", total, windows.len());
    for (service, (window_count, log_count)) in per_service {
        let _ = write!(out, "\n  - {service}: {window_count} window(s) ({log_count} logs)");
    }
    if let Some((start, end)) = time_range(windows) {
        let _ = write!(out, "\nTime range: {} to {}", start.to_rfc3339(), end.to_rfc3339());
    }
    out
}
