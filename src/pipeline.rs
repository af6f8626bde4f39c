//! End-to-end run over one file: ingest → parse → normalize → aggregate → extract.
//!
//! Records stream through parsing and normalization one at a time; only
//! canonical records are collected before aggregation.

use crate::aggregate::{aggregate, AggregationError, Windows};
use crate::config::{ConfigError, PipelineConfig};
use crate::features::FeatureExtractor;
use crate::ingest::{IngestionError, LogSource};
use crate::normalize::normalize_record;
use crate::parse::{build_parser, ParsingError};
use crate::schema::FeatureVector;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Parsing(#[from] ParsingError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// Per-run counters. Skips are reported, never enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub records_ingested: usize,
    pub parse_skipped: usize,
    pub normalize_skipped: usize,
    pub levels_defaulted: usize,
    /// Canonical records whose window falls outside the supported time range
    pub aggregate_skipped: usize,
    pub windows: usize,
    pub extraction_skipped: usize,
    pub vectors: usize,
}

impl PipelineReport {
    /// Fraction of ingested records dropped by parsing or normalization.
    pub fn skip_rate(&self) -> f64 {
        if self.records_ingested == 0 {
            return 0.0;
        }
        (self.parse_skipped + self.normalize_skipped) as f64 / self.records_ingested as f64
    }

    pub fn records_kept(&self) -> usize {
        self.records_ingested - self.parse_skipped - self.normalize_skipped
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One per window, ordered by (window start, service)
    pub vectors: Vec<FeatureVector>,
    pub windows: Windows,
    pub report: PipelineReport,
}

pub struct Pipeline {
    config: PipelineConfig,
    extractor: FeatureExtractor,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let extractor = FeatureExtractor::from_config(&config);
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn run(&self, path: &Path) -> Result<PipelineOutput, PipelineError> {
        let format = self.config.format.resolve(path);
        let source = LogSource::open(path, format, self.config.csv_delimiter_byte())?;
        let header = match &source {
            LogSource::Csv(csv) => csv.headers()?,
            _ => Vec::new(),
        };
        let parser = build_parser(format, self.config.csv_columns.as_ref(), &header)?;
        info!(source = %path.display(), format = %format, "processing");

        let mut report = PipelineReport::default();
        let mut records = Vec::new();
        for raw in source.records()? {
            let raw = raw?;
            report.records_ingested += 1;
            let Some(fields) = parser.parse(&raw) else {
                debug!(source = %raw.provenance, "unparseable record");
                report.parse_skipped += 1;
                continue;
            };
            if fields.level_defaulted {
                report.levels_defaulted += 1;
            }
            let provenance = fields.provenance.clone();
            match normalize_record(fields) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(source = %provenance, error = %e, "skipping record");
                    report.normalize_skipped += 1;
                }
            }
        }
        if report.levels_defaulted > 0 {
            warn!(
                source = %path.display(),
                count = report.levels_defaulted,
                "records without a level were treated as INFO"
            );
        }

        let normalized = records.len();
        let windows = aggregate(records, self.config.window_size_seconds)?;
        report.aggregate_skipped = normalized - windows.values().map(|w| w.log_count()).sum::<usize>();
        let (vectors, extraction_skipped) = self.extractor.extract_batch(windows.values());
        report.windows = windows.len();
        report.extraction_skipped = extraction_skipped;
        report.vectors = vectors.len();

        info!(
            source = %path.display(),
            ingested = report.records_ingested,
            parse_skipped = report.parse_skipped,
            normalize_skipped = report.normalize_skipped,
            aggregate_skipped = report.aggregate_skipped,
            windows = report.windows,
            vectors = report.vectors,
            skip_rate = report.skip_rate(),
            "pipeline complete"
        );
        Ok(PipelineOutput {
            vectors,
            windows,
            report,
        })
    }

    /// Run each file independently, in order. A failing file does not stop the rest.
    pub fn run_files(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<PipelineOutput, PipelineError>)> {
        paths
            .iter()
            .map(|p| {
                let result = self.run(p);
                if let Err(e) = &result {
                    warn!(source = %p.display(), error = %e, "file failed");
                }
                (p.clone(), result)
            })
            .collect()
    }
}
