//! Report command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use librarian::graph::report::{write_report, DetailLevel, ReportOptions, ReportSummary};
use librarian::output::emit_json;
use librarian::validation::absolutize;
use librarian::OutputFormat;

use crate::common::{connect, load_config};

#[derive(Debug, Serialize)]
struct ReportResponse {
    output_dir: String,
    files: Vec<String>,
    summary: ReportSummary,
}

/// Scope prefix in graph path form. Existing paths are canonicalized.
pub fn resolve_scope(scope: &str, cwd: &Path) -> String {
    if scope.is_empty() {
        return String::new();
    }
    let path = Path::new(scope);
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| absolutize(path, cwd))
        .to_string_lossy()
        .into_owned()
}

pub fn run_report(
    config_path: Option<&Path>,
    output: OutputFormat,
    scope: String,
    output_dir: PathBuf,
    exclude: Vec<String>,
    detail: DetailLevel,
) -> Result<()> {
    let config = load_config(config_path)?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let options = ReportOptions {
        scope: resolve_scope(&scope, &cwd),
        exclude,
        detail,
    };

    let remote = connect(&config)?;
    let bundle = write_report(&remote, &options, &output_dir)
        .with_context(|| format!("writing report for {}", options.scope))?;

    let files: Vec<String> = bundle
        .files
        .keys()
        .map(|name| output_dir.join(name).to_string_lossy().into_owned())
        .collect();

    if output.is_json() {
        return emit_json(
            "report",
            ReportResponse {
                output_dir: output_dir.to_string_lossy().into_owned(),
                files,
                summary: bundle.summary,
            },
        );
    }
    let s = &bundle.summary;
    println!(
        "{}: {} notes, {} code files, {} functions, {} classes ({} detail)",
        options.scope,
        s.notes,
        s.code_files,
        s.functions,
        s.classes,
        detail.as_str()
    );
    for file in files {
        println!("wrote {}", file);
    }
    Ok(())
}
