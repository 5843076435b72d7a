//! Aggregate node and edge counts.

use serde::Serialize;
use std::collections::BTreeMap;

use super::query::{GraphQuery, Value};
use super::schema::{EdgeType, NodeLabel};
use super::GraphBackend;
use crate::error::Result;

/// Counts per node label and edge type. Every label and type is present.
///
/// `Note` counts notes backed by a file. Link targets with no file yet are
/// reported separately as placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: BTreeMap<String, u64>,
    pub placeholders: u64,
    pub edges: BTreeMap<String, u64>,
}

impl GraphStats {
    pub fn node_count(&self, label: NodeLabel) -> u64 {
        self.nodes.get(label.as_str()).copied().unwrap_or(0)
    }

    pub fn edge_count(&self, edge: EdgeType) -> u64 {
        self.edges.get(edge.as_str()).copied().unwrap_or(0)
    }
}

/// Count every node label and edge type.
pub fn collect_stats(backend: &dyn GraphBackend) -> Result<GraphStats> {
    let mut stats = GraphStats::default();
    for label in NodeLabel::ALL {
        let count = single_count(backend.query(&GraphQuery::CountNodes { label })?);
        stats.nodes.insert(label.as_str().to_string(), count);
    }
    stats.placeholders = single_count(backend.query(&GraphQuery::CountPlaceholders)?);
    for edge in EdgeType::ALL {
        let count = single_count(backend.query(&GraphQuery::CountEdges { edge })?);
        stats.edges.insert(edge.as_str().to_string(), count);
    }
    Ok(stats)
}

fn single_count(rows: Vec<Vec<Value>>) -> u64 {
    rows.first()
        .and_then(|row| row.first())
        .and_then(Value::as_int)
        .unwrap_or(0)
        .max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_count_handles_empty_and_string_replies() {
        assert_eq!(single_count(vec![]), 0);
        assert_eq!(single_count(vec![vec![Value::Int(4)]]), 4);
        assert_eq!(single_count(vec![vec![Value::Str("7".into())]]), 7);
    }

    #[test]
    fn test_placeholders_are_not_notes() {
        use crate::graph::{GraphOp, MemoryGraph};

        let graph = MemoryGraph::new();
        graph
            .execute(&GraphOp::UpsertNote {
                path: "/v/Alpha.md".into(),
                name: "Alpha".into(),
                modified: 0,
                headings: 0,
            })
            .unwrap();
        graph
            .execute(&GraphOp::Link {
                path: "/v/Alpha.md".into(),
                target: "Beta".into(),
                embed: false,
            })
            .unwrap();

        let stats = collect_stats(&graph).unwrap();
        assert_eq!(stats.node_count(NodeLabel::Note), 1);
        assert_eq!(stats.placeholders, 1);
        assert_eq!(stats.edge_count(EdgeType::LinksTo), 1);
    }
}
