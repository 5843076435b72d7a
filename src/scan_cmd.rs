//! Scan command implementation

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use librarian::graph::SyncEngine;
use librarian::ingest::external::save_index;
use librarian::output::emit_json;
use librarian::scan::{project_roots, ScanContext, ScanProgress};
use librarian::validation::canonicalize_root;
use librarian::{build_pool, full_scan, LibrarianConfig, LibrarianError, OutputFormat, ScanSummary, SyncMode};

use crate::common::{load_config, print_diagnostics, progress_bar, SyncTarget};

#[derive(Debug, Serialize)]
struct ScanResponse {
    mode: SyncMode,
    roots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commands_written: Option<u64>,
    #[serde(flatten)]
    summary: ScanSummary,
}

/// Roots for this run: the explicit path, or every enabled root.
fn scan_roots(config: &LibrarianConfig, path: Option<&Path>) -> Result<Vec<PathBuf>> {
    let roots = match path {
        Some(path) => vec![canonicalize_root(path).map_err(|e| {
            LibrarianError::config(format!("scan path {}: {}", path.display(), e))
        })?],
        None => ScanContext::new(config)?.configured_roots(),
    };
    if roots.is_empty() {
        bail!(LibrarianError::config("none of the configured source roots exist"));
    }
    Ok(roots)
}

pub fn run_scan(
    config_path: Option<&Path>,
    output: OutputFormat,
    path: Option<PathBuf>,
    dump: Option<PathBuf>,
    save_index_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let roots = scan_roots(&config, path.as_deref())?;
    let pool = build_pool(config.worker_count())?;

    let target = SyncTarget::open(&config, dump.as_deref())?;
    let engine = SyncEngine::new(target.backend(), project_roots(&config), target.mode());

    let pb = progress_bar("parsing", output.is_json());
    let progress = {
        let pb = pb.clone();
        move |done: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }
    };
    let progress: &ScanProgress = &progress;
    let scan = full_scan(&config, &roots, Some(&engine), &pool, Some(progress));
    pb.finish_and_clear();
    let scan = scan.context("scan aborted")?;

    if let Some(index) = &save_index_path {
        save_index(index, &scan.records)
            .with_context(|| format!("saving metadata index to {}", index.display()))?;
    }

    let response = ScanResponse {
        mode: target.mode(),
        roots: roots.iter().map(|r| r.to_string_lossy().into_owned()).collect(),
        commands_written: target.commands_written(),
        summary: scan.summary,
    };

    if output.is_json() && !target.dumps_to_stdout() {
        return emit_json("scan", response);
    }

    let report = format_summary(&response);
    if target.dumps_to_stdout() {
        eprint!("{}", report);
    } else {
        print!("{}", report);
    }
    print_diagnostics(response.summary.warnings());
    Ok(())
}

fn format_summary(response: &ScanResponse) -> String {
    let s = &response.summary;
    let mut out = String::new();
    out.push_str(&format!(
        "scanned: {}  succeeded: {}  failed: {}  skipped: {}  assets: {}\n",
        s.scanned, s.succeeded, s.failed, s.skipped, s.assets
    ));
    match response.commands_written {
        Some(commands) => out.push_str(&format!("dump: {} commands\n", commands)),
        None => out.push_str(&format!("operations: {}\n", s.operations)),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary_dump_mode() {
        let response = ScanResponse {
            mode: SyncMode::Dump,
            roots: vec![],
            commands_written: Some(12),
            summary: ScanSummary {
                scanned: 3,
                succeeded: 2,
                failed: 1,
                ..Default::default()
            },
        };
        let text = format_summary(&response);
        assert!(text.contains("scanned: 3  succeeded: 2  failed: 1"));
        assert!(text.contains("dump: 12 commands"));
    }

    #[test]
    fn test_missing_scan_path_is_config_error() {
        let config = LibrarianConfig::default();
        let err = scan_roots(&config, Some(Path::new("/definitely/not/here"))).unwrap_err();
        assert_eq!(librarian::error::exit_code_for(&err), librarian::error::EXIT_CONFIG);
    }
}
