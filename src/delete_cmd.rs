//! Delete command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use librarian::output::emit_json;
use librarian::scan::{project_roots, ScanContext};
use librarian::validation::{resolve_identity, validate_within_roots};
use librarian::{OutputFormat, SyncEngine, SyncMode};

use crate::common::{connect, load_config};

#[derive(Debug, Serialize)]
struct DeleteResponse {
    path: String,
    operations: usize,
}

pub fn run_delete(config_path: Option<&Path>, output: OutputFormat, path: PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let identity = resolve_identity(&path, &cwd);

    let roots = ScanContext::new(&config)?.configured_roots();
    if let Err(e) = validate_within_roots(&identity, &roots) {
        tracing::warn!(error = %e, "deleting a path outside the configured roots");
    }

    let remote = connect(&config)?;
    let engine = SyncEngine::new(&remote, project_roots(&config), SyncMode::Direct);
    let key = identity.to_string_lossy().into_owned();
    let operations = engine
        .delete_file(&key)
        .with_context(|| format!("deleting {}", key))?;

    if output.is_json() {
        return emit_json("delete", DeleteResponse { path: key, operations });
    }
    println!("deleted {}", key);
    Ok(())
}
