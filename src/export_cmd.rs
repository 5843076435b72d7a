//! Export command implementation

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use librarian::graph::export::{render, ExcludeSet, ExportFormat, GraphSnapshot};

use crate::common::{connect, load_config};
use crate::report_cmd::resolve_scope;

pub fn run_export(
    config_path: Option<&Path>,
    format: ExportFormat,
    scope: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let scope = resolve_scope(scope.as_deref().unwrap_or(""), &cwd);

    let remote = connect(&config)?;
    let snapshot = GraphSnapshot::load(&remote, &scope, &ExcludeSet::none())
        .with_context(|| format!("reading graph under '{}'", scope))?;
    let mut text = render(&snapshot, format)?;
    if !text.ends_with('\n') {
        text.push('\n');
    }

    match out {
        Some(path) => {
            std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), files = snapshot.files.len(), "export written");
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(text.as_bytes())?;
            lock.flush()?;
        }
    }
    Ok(())
}
