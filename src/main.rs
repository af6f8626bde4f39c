//! logfeat entrypoint: turn log files into NDJSON feature vectors on stdout.
//! Inputs are files or directories given on the command line; diagnostics and
//! per-file summaries go to stderr.

use logfeat::{
    config::PipelineConfig,
    ingest::is_supported_extension,
    logging::{RunSummary, StructuredLogger},
    pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineReport},
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Expand directories (sorted, recursive) into supported log files.
fn collect_inputs(args: impl IntoIterator<Item = String>) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for arg in args {
        let path = PathBuf::from(arg);
        if path.is_dir() {
            for entry in WalkDir::new(&path).sort_by_file_name() {
                match entry {
                    Ok(e) if e.file_type().is_file() && is_supported_extension(e.path()) => {
                        inputs.push(e.into_path())
                    }
                    Ok(_) => {}
                    Err(e) => warn!(root = %path.display(), error = %e, "walk error"),
                }
            }
        } else {
            inputs.push(path);
        }
    }
    inputs
}

/// Outcome of one file: the pipeline result, or the reason its worker died.
type FileResult = Result<PipelineOutput, String>;

/// Each file runs on the blocking pool; results come back in input order.
/// A worker that panics or is cancelled still yields an entry for its file.
async fn run_all<F>(run: Arc<F>, inputs: Vec<PathBuf>) -> Vec<(PathBuf, FileResult)>
where
    F: Fn(&Path) -> Result<PipelineOutput, PipelineError> + Send + Sync + 'static,
{
    let handles: Vec<_> = inputs
        .into_iter()
        .map(|path| {
            let run = Arc::clone(&run);
            let worker_path = path.clone();
            let handle = tokio::task::spawn_blocking(move || (*run)(&worker_path));
            (path, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let result = match handle.await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => {
                warn!(source = %path.display(), error = %e, "worker task failed");
                Err(format!("worker task failed: {e}"))
            }
        };
        results.push((path, result));
    }
    results
}

/// Output is only byte-identical across runs with a pinned extraction stamp.
fn unpinned_stamp_warning(config: &PipelineConfig) -> Option<&'static str> {
    config.extraction_timestamp.is_none().then_some(
        "extraction_timestamp is not set; vector metadata carries the current time and output differs between runs",
    )
}

fn main() -> Result<(), BoxError> {
    let config_path = std::env::var("LOGFEAT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("logfeat.json"));
    let config = PipelineConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    let inputs = collect_inputs(std::env::args().skip(1));
    if inputs.is_empty() {
        return Err("usage: logfeat <file-or-dir>...\n\
            set extraction_timestamp in the config for byte-identical output across runs"
            .into());
    }
    if let Some(message) = unpinned_stamp_warning(&config) {
        warn!("{message}");
    }
    info!(config = %config_path.display(), files = inputs.len(), window_size_seconds = config.window_size_seconds, "logfeat starting");

    let pipeline = Pipeline::new(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread().build()?;
    let results = runtime.block_on(run_all(Arc::new(move |path: &Path| pipeline.run(path)), inputs));

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    let mut stderr = std::io::stderr();
    let mut failed = 0usize;
    for (path, result) in &results {
        let source = path.display().to_string();
        match result {
            Ok(output) => {
                for vector in &output.vectors {
                    StructuredLogger::emit_json(vector, &mut out)?;
                }
                StructuredLogger::emit_json(&RunSummary::new(&source, &output.report), &mut stderr)?;
            }
            Err(e) => {
                failed += 1;
                let empty = PipelineReport::default();
                let mut summary = RunSummary::new(&source, &empty);
                summary.error = Some(e.clone());
                StructuredLogger::emit_json(&summary, &mut stderr)?;
            }
        }
    }
    out.flush()?;

    info!(files = results.len(), failed, "logfeat finished");
    if failed == results.len() {
        return Err(format!("all {failed} input(s) failed").into());
    }
    Ok(())
}
