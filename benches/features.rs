//! Feature extraction benchmark: large windows, with and without durations.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use logfeat::aggregate::aggregate;
use logfeat::features::FeatureExtractor;
use logfeat::normalize::normalize_batch;
use logfeat::parse::ParsedFields;
use logfeat::{LogRecord, Provenance, SourceFormat};
use serde_json::{json, Value};

fn make_records(n: usize, with_durations: bool) -> Vec<LogRecord> {
    let parsed: Vec<ParsedFields> = (0..n)
        .map(|i| {
            let mut p = ParsedFields::new(Provenance {
                source: "bench".to_string(),
                index: i as u64 + 1,
                format: SourceFormat::Json,
            });
            // Everything lands in one 5-minute window.
            p.timestamp = Some(json!(1_738_922_400.0 + (i % 300) as f64 + 0.25));
            p.level = Some(["INFO", "WARN", "ERROR", "DEBUG"][i % 4].to_string());
            p.service = Some("api".to_string());
            p.message = Some(format!("request {} done", i % 211));
            p.duration = with_durations.then(|| Value::from((i * 13) % 5000 + 1));
            p.error_code = (i % 4 == 2).then(|| format!("E{}", i % 17));
            p
        })
        .collect();
    normalize_batch(parsed).0
}

fn bench_extract(c: &mut Criterion) {
    let extractor = FeatureExtractor::at(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

    let mut g = c.benchmark_group("extract_window");
    for n in [1_000usize, 10_000, 100_000] {
        for with_durations in [false, true] {
            let windows = aggregate(make_records(n, with_durations), 300).expect("aggregate");
            let label = if with_durations { "durations" } else { "counts_only" };
            g.bench_with_input(BenchmarkId::new(label, n), &windows, |b, windows| {
                b.iter(|| black_box(extractor.extract_batch(windows.values())))
            });
        }
    }
    g.finish();
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
