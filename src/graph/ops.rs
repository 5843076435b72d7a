//! Graph write operations.
//!
//! A [`GraphOp`] is one idempotent step of a file's sync sequence. Every op has
//! exactly one Cypher rendering, shared by direct mode and dump mode, so both
//! modes issue identical statements.

use serde::Serialize;

use super::schema::{DefinitionKind, EdgeType, FileLabel};
use crate::ingest::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphOp {
    /// Give a path to a same-named placeholder note, unless the path already has a node.
    ClaimPlaceholder { path: String, name: String },
    UpsertNote {
        path: String,
        name: String,
        modified: i64,
        headings: u32,
    },
    UpsertCode {
        path: String,
        name: String,
        language: String,
        modified: i64,
    },
    /// Detach-delete tasks and definitions owned by the file.
    DropOwnedNodes { label: FileLabel, path: String },
    /// Delete the file's owned outgoing edges.
    DropOwnedEdges { label: FileLabel, path: String },
    /// Delete incoming CONTAINS edges.
    DropMembership { label: FileLabel, path: String },
    Link {
        path: String,
        target: String,
        embed: bool,
    },
    Tag { path: String, tag: String },
    AddTask {
        label: FileLabel,
        path: String,
        text: String,
        line: usize,
        status: TaskStatus,
    },
    Define {
        path: String,
        kind: DefinitionKind,
        name: String,
        line: usize,
    },
    Import { path: String, module: String },
    Contain {
        label: FileLabel,
        path: String,
        project: String,
    },
    DeleteNode { label: FileLabel, path: String },
}

impl GraphOp {
    /// Path of the file this op belongs to.
    pub fn path(&self) -> &str {
        match self {
            GraphOp::ClaimPlaceholder { path, .. }
            | GraphOp::UpsertNote { path, .. }
            | GraphOp::UpsertCode { path, .. }
            | GraphOp::DropOwnedNodes { path, .. }
            | GraphOp::DropOwnedEdges { path, .. }
            | GraphOp::DropMembership { path, .. }
            | GraphOp::Link { path, .. }
            | GraphOp::Tag { path, .. }
            | GraphOp::AddTask { path, .. }
            | GraphOp::Define { path, .. }
            | GraphOp::Import { path, .. }
            | GraphOp::Contain { path, .. }
            | GraphOp::DeleteNode { path, .. } => path,
        }
    }

    /// Cypher statement for this op.
    pub fn to_cypher(&self) -> String {
        match self {
            GraphOp::ClaimPlaceholder { path, name } => format!(
                "OPTIONAL MATCH (e:Note {{path: {p}}}) WITH e WHERE e IS NULL \
                 MATCH (n:Note {{name: {n}}}) WHERE n.path IS NULL \
                 WITH n LIMIT 1 SET n.path = {p}",
                p = lit(path),
                n = lit(name)
            ),
            GraphOp::UpsertNote {
                path,
                name,
                modified,
                headings,
            } => format!(
                "MERGE (n:Note {{path: {}}}) SET n.name = {}, n.modified = {}, n.headings = {}",
                lit(path),
                lit(name),
                modified,
                headings
            ),
            GraphOp::UpsertCode {
                path,
                name,
                language,
                modified,
            } => format!(
                "MERGE (c:Code {{path: {}}}) SET c.name = {}, c.language = {}, c.modified = {}",
                lit(path),
                lit(name),
                lit(language),
                modified
            ),
            GraphOp::DropOwnedNodes { label, path } => format!(
                "MATCH (f:{} {{path: {}}})-[:{}]->(d) DETACH DELETE d",
                label.as_str(),
                lit(path),
                edge_union(label.owned_node_edges())
            ),
            GraphOp::DropOwnedEdges { label, path } => format!(
                "MATCH (f:{} {{path: {}}})-[r:{}]->() DELETE r",
                label.as_str(),
                lit(path),
                edge_union(label.owned_edges())
            ),
            GraphOp::DropMembership { label, path } => format!(
                "MATCH (:Project)-[r:CONTAINS]->(f:{} {{path: {}}}) DELETE r",
                label.as_str(),
                lit(path)
            ),
            GraphOp::Link {
                path,
                target,
                embed,
            } => {
                let edge = if *embed {
                    EdgeType::Embeds
                } else {
                    EdgeType::LinksTo
                };
                format!(
                    "MATCH (a:Note {{path: {}}}) MERGE (b:Note {{name: {}}}) MERGE (a)-[:{}]->(b)",
                    lit(path),
                    lit(target),
                    edge.as_str()
                )
            }
            GraphOp::Tag { path, tag } => format!(
                "MATCH (n:Note {{path: {}}}) MERGE (t:Tag {{name: {}}}) MERGE (n)-[:TAGGED]->(t)",
                lit(path),
                lit(tag)
            ),
            GraphOp::AddTask {
                label,
                path,
                text,
                line,
                status,
            } => format!(
                "MATCH (f:{} {{path: {p}}}) CREATE (f)-[:HAS_TASK]->(:Task {{text: {}, line: {}, status: {}, path: {p}}})",
                label.as_str(),
                lit(text),
                line,
                lit(status.as_str()),
                p = lit(path)
            ),
            GraphOp::Define {
                path,
                kind,
                name,
                line,
            } => format!(
                "MATCH (c:Code {{path: {p}}}) MERGE (d:{} {{name: {}, path: {p}}}) SET d.line = {} MERGE (c)-[:DEFINES]->(d)",
                kind.node_label().as_str(),
                lit(name),
                line,
                p = lit(path)
            ),
            GraphOp::Import { path, module } => format!(
                "MATCH (c:Code {{path: {}}}) MERGE (m:Module {{name: {}}}) MERGE (c)-[:IMPORTS]->(m)",
                lit(path),
                lit(module)
            ),
            GraphOp::Contain {
                label,
                path,
                project,
            } => format!(
                "MATCH (f:{} {{path: {}}}) MERGE (p:Project {{name: {}}}) MERGE (p)-[:CONTAINS]->(f)",
                label.as_str(),
                lit(path),
                lit(project)
            ),
            GraphOp::DeleteNode { label, path } => format!(
                "MATCH (f:{} {{path: {}}}) DETACH DELETE f",
                label.as_str(),
                lit(path)
            ),
        }
    }
}

fn edge_union(edges: &[EdgeType]) -> String {
    edges
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join("|")
}

/// Single-quoted Cypher string literal.
pub fn lit(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
