//! Analyze command implementation

use anyhow::{Context, Result};
use std::path::Path;

use librarian::analyze::{analyze_project, webhook_config};
use librarian::output::emit_json;
use librarian::OutputFormat;

use crate::common::{connect, load_config};

pub fn run_analyze(config_path: Option<&Path>, output: OutputFormat, project: String) -> Result<()> {
    let config = load_config(config_path)?;
    // Fail on missing webhook config before touching the database.
    webhook_config(&config)?;
    let remote = connect(&config)?;
    let outcome = analyze_project(&remote, &config, &project)
        .with_context(|| format!("analyzing project '{}'", project))?;

    if output.is_json() {
        return emit_json("analyze", outcome);
    }
    println!("submitted {} (HTTP {})", outcome.project, outcome.status);
    if !outcome.response.trim().is_empty() {
        println!("{}", outcome.response.trim());
    }
    Ok(())
}
