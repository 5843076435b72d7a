//! ingest-external-index command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use librarian::ingest::external::load_index;
use librarian::output::emit_json;
use librarian::scan::project_roots;
use librarian::{build_pool, OutputFormat, SyncEngine, SyncMode, SyncReport};

use crate::common::{load_config, print_diagnostics, SyncTarget};

#[derive(Debug, Serialize)]
struct IngestResponse {
    index: String,
    mode: SyncMode,
    records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    commands_written: Option<u64>,
    #[serde(flatten)]
    report: SyncReport,
}

pub fn run_ingest(
    config_path: Option<&Path>,
    output: OutputFormat,
    path: PathBuf,
    dump: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let records = load_index(&path).with_context(|| format!("reading index {}", path.display()))?;
    tracing::info!(records = records.len(), index = %path.display(), "loaded metadata index");

    let target = SyncTarget::open(&config, dump.as_deref())?;
    let engine = SyncEngine::new(target.backend(), project_roots(&config), target.mode());
    let pool = build_pool(config.worker_count())?;
    let report = engine
        .sync_all(&records, Some(&pool), None)
        .context("ingest aborted")?;

    let response = IngestResponse {
        index: path.to_string_lossy().into_owned(),
        mode: target.mode(),
        records: records.len(),
        commands_written: target.commands_written(),
        report,
    };
    if output.is_json() && !target.dumps_to_stdout() {
        return emit_json("ingest-external-index", response);
    }

    let line = format!(
        "records: {}  succeeded: {}  failed: {}\n",
        response.records, response.report.succeeded, response.report.failed
    );
    if target.dumps_to_stdout() {
        eprint!("{}", line);
    } else {
        print!("{}", line);
    }
    print_diagnostics(response.report.diagnostics.iter());
    Ok(())
}
