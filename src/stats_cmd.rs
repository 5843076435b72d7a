//! Stats command implementation

use anyhow::{Context, Result};
use std::path::Path;

use librarian::output::emit_json;
use librarian::{collect_stats, GraphStats, OutputFormat};

use crate::common::{connect, load_config};

pub fn run_stats(config_path: Option<&Path>, output: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let remote = connect(&config)?;
    let stats = collect_stats(&remote).context("counting graph contents")?;

    if output.is_json() {
        return emit_json("stats", stats);
    }
    print!("{}", format_stats(&stats));
    Ok(())
}

fn format_stats(stats: &GraphStats) -> String {
    let width = stats
        .nodes
        .keys()
        .chain(stats.edges.keys())
        .map(String::len)
        .max()
        .unwrap_or(0);
    let mut out = String::from("nodes:\n");
    for (label, count) in &stats.nodes {
        out.push_str(&format!("  {:<width$}  {}\n", label, count, width = width));
    }
    if stats.placeholders > 0 {
        out.push_str(&format!(
            "  {:<width$}  {}\n",
            "(unresolved)",
            stats.placeholders,
            width = width
        ));
    }
    out.push_str("edges:\n");
    for (edge, count) in &stats.edges {
        out.push_str(&format!("  {:<width$}  {}\n", edge, count, width = width));
    }
    out
}
