//! Query command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use librarian::graph::query::{self, Location, NoteRef};
use librarian::output::emit_json;
use librarian::{GraphBackend, OutputFormat};

use crate::cli::QueryKind;
use crate::common::{connect, load_config};

/// Rows of one query, by result shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Paths(Vec<String>),
    Locations(Vec<Location>),
    Notes(Vec<NoteRef>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Paths(v) => v.len(),
            QueryResult::Locations(v) => v.len(),
            QueryResult::Notes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One result per line.
    pub fn lines(&self) -> Vec<String> {
        match self {
            QueryResult::Paths(paths) => paths.clone(),
            QueryResult::Locations(locations) => locations
                .iter()
                .map(|l| format!("{}:{}", l.path, l.line))
                .collect(),
            QueryResult::Notes(notes) => notes
                .iter()
                .map(|n| match &n.path {
                    Some(path) => format!("{}\t{}", n.name, path),
                    None => format!("{}\t(not indexed)", n.name),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryResponse<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    argument: Option<&'a str>,
    count: usize,
    results: QueryResult,
}

fn describe(kind: &QueryKind) -> (&'static str, Option<&str>) {
    match kind {
        QueryKind::Orphans => ("orphans", None),
        QueryKind::Backlinks { name } => ("backlinks", Some(name.as_str())),
        QueryKind::Tags { tag } => ("tags", Some(tag.as_str())),
        QueryKind::Functions { name } => ("functions", Some(name.as_str())),
        QueryKind::Classes { name } => ("classes", Some(name.as_str())),
        QueryKind::Related { name } => ("related", Some(name.as_str())),
    }
}

pub fn execute(backend: &dyn GraphBackend, kind: &QueryKind) -> librarian::Result<QueryResult> {
    Ok(match kind {
        QueryKind::Orphans => QueryResult::Paths(query::orphans(backend)?),
        QueryKind::Backlinks { name } => QueryResult::Paths(query::backlinks(backend, name)?),
        QueryKind::Tags { tag } => QueryResult::Paths(query::notes_by_tag(backend, tag)?),
        QueryKind::Functions { name } => QueryResult::Locations(query::functions(backend, name)?),
        QueryKind::Classes { name } => QueryResult::Locations(query::classes(backend, name)?),
        QueryKind::Related { name } => QueryResult::Notes(query::related(backend, name)?),
    })
}

pub fn run_query(config_path: Option<&Path>, output: OutputFormat, kind: QueryKind) -> Result<()> {
    let config = load_config(config_path)?;
    let remote = connect(&config)?;
    let (name, argument) = describe(&kind);
    let results = execute(&remote, &kind).with_context(|| format!("running {} query", name))?;

    if output.is_json() {
        return emit_json(
            "query",
            QueryResponse {
                query: name,
                argument,
                count: results.len(),
                results,
            },
        );
    }
    for line in results.lines() {
        println!("{}", line);
    }
    Ok(())
}
