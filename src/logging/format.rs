//! Diagnostics go to stderr through tracing; data lines (one JSON object per
//! line) go to whatever writer the caller hands to `emit_json`.

use crate::pipeline::PipelineReport;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Summary line written once per processed file.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub ts: String,
    pub kind: &'a str,
    pub source: &'a str,
    #[serde(flatten)]
    pub report: &'a PipelineReport,
    pub skip_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> RunSummary<'a> {
    pub fn new(source: &'a str, report: &'a PipelineReport) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            kind: "run_summary",
            source,
            report,
            skip_rate: report.skip_rate(),
            error: None,
        }
    }
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber writing to stderr. `RUST_LOG` wins over `default_level`.
    /// A second call is a no-op.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let result = if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
        };
        if result.is_err() {
            tracing::debug!("subscriber already installed");
        }
    }

    /// Write one value as a single JSON line.
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)
    }
}
