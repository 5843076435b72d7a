//! In-process graph backend.
//!
//! Applies [`GraphOp`]s with the same MERGE/MATCH semantics as their Cypher
//! renderings and answers every [`GraphQuery`]. Used for tests, benchmarks
//! and anywhere a database round trip is not wanted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::time::Duration;

use super::ops::GraphOp;
use super::query::{GraphQuery, Row, Value};
use super::schema::{EdgeType, NodeLabel};
use super::GraphBackend;
use crate::error::{LibrarianError, Result};

type NodeId = u64;

#[derive(Debug, Clone)]
struct Node {
    label: NodeLabel,
    props: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct State {
    next_id: NodeId,
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeSet<(NodeId, EdgeType, NodeId)>,
}

/// Graph held in memory behind a lock.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
    latency: Option<Duration>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` on every write, to model a remote round trip.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: RwLock::default(),
            latency: Some(latency),
        }
    }

    pub fn node_count(&self) -> usize {
        self.state.read().map(|s| s.nodes.len()).unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().map(|s| s.edges.len()).unwrap_or(0)
    }

    /// Id-independent description of every node and edge, sorted.
    ///
    /// Two graphs with equal fingerprints hold the same nodes, properties and edges.
    pub fn fingerprint(&self) -> Vec<String> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let describe = |id: &NodeId| {
            state
                .nodes
                .get(id)
                .map(|n| format!("{}{:?}", n.label, n.props))
                .unwrap_or_else(|| format!("<missing {}>", id))
        };
        let mut lines: Vec<String> = state.nodes.keys().map(|id| describe(id)).collect();
        lines.extend(
            state
                .edges
                .iter()
                .map(|(a, t, b)| format!("{} -{}-> {}", describe(a), t, describe(b))),
        );
        lines.sort();
        lines
    }

    /// Edges whose endpoints no longer exist. Always empty for a consistent graph.
    pub fn dangling_edges(&self) -> usize {
        self.state
            .read()
            .map(|s| {
                s.edges
                    .iter()
                    .filter(|(a, _, b)| !s.nodes.contains_key(a) || !s.nodes.contains_key(b))
                    .count()
            })
            .unwrap_or(0)
    }
}

fn poisoned() -> LibrarianError {
    LibrarianError::Query("in-memory graph lock poisoned".to_string())
}

fn s(v: &str) -> Value {
    Value::Str(v.to_string())
}

impl State {
    fn find(&self, label: NodeLabel, props: &[(&str, &str)]) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| {
                n.label == label
                    && props
                        .iter()
                        .all(|(k, v)| n.props.get(*k).and_then(Value::as_str) == Some(*v))
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn create(&mut self, label: NodeLabel, props: &[(&str, Value)]) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        let props = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.nodes.insert(id, Node { label, props });
        id
    }

    /// MERGE by key properties; returns every match, or one new node.
    fn merge(&mut self, label: NodeLabel, keys: &[(&str, &str)]) -> Vec<NodeId> {
        let found = self.find(label, keys);
        if !found.is_empty() {
            return found;
        }
        let props: Vec<(&str, Value)> = keys.iter().map(|(k, v)| (*k, s(v))).collect();
        vec![self.create(label, &props)]
    }

    fn set(&mut self, id: NodeId, key: &str, value: Value) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.props.insert(key.to_string(), value);
        }
    }

    fn detach_delete(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.edges.retain(|(a, _, b)| *a != id && *b != id);
    }

    fn targets(&self, from: NodeId, types: &[EdgeType]) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(a, t, _)| *a == from && types.contains(t))
            .map(|(_, _, b)| *b)
            .collect()
    }

    fn prop(&self, id: NodeId, key: &str) -> Value {
        self.nodes
            .get(&id)
            .and_then(|n| n.props.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn label_of(&self, id: NodeId) -> Option<NodeLabel> {
        self.nodes.get(&id).map(|n| n.label)
    }

    fn has_path(&self, id: NodeId) -> bool {
        !self.prop(id, "path").is_null()
    }

    fn apply(&mut self, op: &GraphOp) {
        match op {
            GraphOp::ClaimPlaceholder { path, name } => {
                if !self.find(NodeLabel::Note, &[("path", path.as_str())]).is_empty() {
                    return;
                }
                let placeholder = self
                    .find(NodeLabel::Note, &[("name", name.as_str())])
                    .into_iter()
                    .find(|id| !self.has_path(*id));
                if let Some(id) = placeholder {
                    self.set(id, "path", s(path));
                }
            }
            GraphOp::UpsertNote {
                path,
                name,
                modified,
                headings,
            } => {
                for id in self.merge(NodeLabel::Note, &[("path", path.as_str())]) {
                    self.set(id, "name", s(name));
                    self.set(id, "modified", Value::Int(*modified));
                    self.set(id, "headings", Value::Int(*headings as i64));
                }
            }
            GraphOp::UpsertCode {
                path,
                name,
                language,
                modified,
            } => {
                for id in self.merge(NodeLabel::Code, &[("path", path.as_str())]) {
                    self.set(id, "name", s(name));
                    self.set(id, "language", s(language));
                    self.set(id, "modified", Value::Int(*modified));
                }
            }
            GraphOp::DropOwnedNodes { label, path } => {
                for file in self.find(label.node_label(), &[("path", path.as_str())]) {
                    for owned in self.targets(file, label.owned_node_edges()) {
                        self.detach_delete(owned);
                    }
                }
            }
            GraphOp::DropOwnedEdges { label, path } => {
                let owned = label.owned_edges();
                for file in self.find(label.node_label(), &[("path", path.as_str())]) {
                    self.edges.retain(|(a, t, _)| !(*a == file && owned.contains(t)));
                }
            }
            GraphOp::DropMembership { label, path } => {
                for file in self.find(label.node_label(), &[("path", path.as_str())]) {
                    let projects: BTreeSet<NodeId> =
                        self.find(NodeLabel::Project, &[]).into_iter().collect();
                    self.edges.retain(|(a, t, b)| {
                        !(*b == file && *t == EdgeType::Contains && projects.contains(a))
                    });
                }
            }
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
                for from in self.find(NodeLabel::Note, &[("path", path.as_str())]) {
                    for to in self.merge(NodeLabel::Note, &[("name", target.as_str())]) {
                        self.edges.insert((from, edge, to));
                    }
                }
            }
            GraphOp::Tag { path, tag } => {
                for from in self.find(NodeLabel::Note, &[("path", path.as_str())]) {
                    for to in self.merge(NodeLabel::Tag, &[("name", tag.as_str())]) {
                        self.edges.insert((from, EdgeType::Tagged, to));
                    }
                }
            }
            GraphOp::AddTask {
                label,
                path,
                text,
                line,
                status,
            } => {
                for from in self.find(label.node_label(), &[("path", path.as_str())]) {
                    let task = self.create(
                        NodeLabel::Task,
                        &[
                            ("text", s(text)),
                            ("line", Value::Int(*line as i64)),
                            ("status", s(status.as_str())),
                            ("path", s(path)),
                        ],
                    );
                    self.edges.insert((from, EdgeType::HasTask, task));
                }
            }
            GraphOp::Define {
                path,
                kind,
                name,
                line,
            } => {
                for from in self.find(NodeLabel::Code, &[("path", path.as_str())]) {
                    for def in self.merge(kind.node_label(), &[("name", name.as_str()), ("path", path.as_str())]) {
                        self.set(def, "line", Value::Int(*line as i64));
                        self.edges.insert((from, EdgeType::Defines, def));
                    }
                }
            }
            GraphOp::Import { path, module } => {
                for from in self.find(NodeLabel::Code, &[("path", path.as_str())]) {
                    for to in self.merge(NodeLabel::Module, &[("name", module.as_str())]) {
                        self.edges.insert((from, EdgeType::Imports, to));
                    }
                }
            }
            GraphOp::Contain {
                label,
                path,
                project,
            } => {
                for file in self.find(label.node_label(), &[("path", path.as_str())]) {
                    for p in self.merge(NodeLabel::Project, &[("name", project.as_str())]) {
                        self.edges.insert((p, EdgeType::Contains, file));
                    }
                }
            }
            GraphOp::DeleteNode { label, path } => {
                for id in self.find(label.node_label(), &[("path", path.as_str())]) {
                    self.detach_delete(id);
                }
            }
        }
    }

    fn sources(&self, to: NodeId, edge: EdgeType) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, t, b)| *b == to && *t == edge)
            .map(|(a, _, _)| *a)
            .collect()
    }

    fn is_file(&self, id: NodeId) -> bool {
        matches!(self.label_of(id), Some(NodeLabel::Note | NodeLabel::Code))
    }

    fn path_starts_with(&self, id: NodeId, prefix: &str) -> bool {
        self.prop(id, "path")
            .as_str()
            .map(|p| p.starts_with(prefix))
            .unwrap_or(false)
    }

    fn run(&self, query: &GraphQuery) -> Vec<Row> {
        match query {
            GraphQuery::Orphans => {
                let mut rows: Vec<Row> = self
                    .find(NodeLabel::Note, &[])
                    .into_iter()
                    .filter(|id| self.has_path(*id))
                    .filter(|id| {
                        self.sources(*id, EdgeType::LinksTo)
                            .iter()
                            .all(|src| self.label_of(*src) != Some(NodeLabel::Note))
                    })
                    .map(|id| vec![self.prop(id, "path")])
                    .collect();
                rows.sort_by(|a, b| a[0].as_str().cmp(&b[0].as_str()));
                rows
            }
            GraphQuery::Backlinks { name } => {
                let paths: BTreeSet<String> = self
                    .find(NodeLabel::Note, &[("name", name.as_str())])
                    .into_iter()
                    .flat_map(|target| self.sources(target, EdgeType::LinksTo))
                    .filter(|src| self.label_of(*src) == Some(NodeLabel::Note))
                    .filter_map(|src| self.prop(src, "path").as_str().map(str::to_string))
                    .collect();
                paths.into_iter().map(|p| vec![Value::Str(p)]).collect()
            }
            GraphQuery::NotesByTag { tag } => {
                let mut rows: Vec<Row> = self
                    .find(NodeLabel::Tag, &[("name", tag.as_str())])
                    .into_iter()
                    .flat_map(|t| self.sources(t, EdgeType::Tagged))
                    .map(|n| vec![self.prop(n, "path")])
                    .collect();
                rows.sort_by(|a, b| a[0].as_str().cmp(&b[0].as_str()));
                rows
            }
            GraphQuery::Functions { name } | GraphQuery::Classes { name } => {
                let label = if matches!(query, GraphQuery::Functions { .. }) {
                    NodeLabel::Function
                } else {
                    NodeLabel::Class
                };
                self.find(label, &[("name", name.as_str())])
                    .into_iter()
                    .map(|id| vec![self.prop(id, "path"), self.prop(id, "line")])
                    .collect()
            }
            GraphQuery::Related { name } => {
                let mut related = BTreeSet::new();
                for n in self.find(NodeLabel::Note, &[("name", name.as_str())]) {
                    let mut candidates = self.targets(n, &[EdgeType::LinksTo]);
                    candidates.extend(self.sources(n, EdgeType::LinksTo));
                    for tag in self.targets(n, &[EdgeType::Tagged]) {
                        candidates.extend(self.sources(tag, EdgeType::Tagged));
                    }
                    for m in candidates {
                        if m != n && self.label_of(m) == Some(NodeLabel::Note) {
                            related.insert(m);
                        }
                    }
                }
                related
                    .into_iter()
                    .map(|m| vec![self.prop(m, "name"), self.prop(m, "path")])
                    .collect()
            }
            GraphQuery::CountNodes { label } => {
                let count = self
                    .find(*label, &[])
                    .into_iter()
                    .filter(|id| *label != NodeLabel::Note || self.has_path(*id))
                    .count();
                vec![vec![Value::Int(count as i64)]]
            }
            GraphQuery::CountPlaceholders => {
                let count = self
                    .find(NodeLabel::Note, &[])
                    .into_iter()
                    .filter(|id| !self.has_path(*id))
                    .count();
                vec![vec![Value::Int(count as i64)]]
            }
            GraphQuery::CountEdges { edge } => {
                let count = self.edges.iter().filter(|(_, t, _)| t == edge).count();
                vec![vec![Value::Int(count as i64)]]
            }
            GraphQuery::Project { name } => self
                .find(NodeLabel::Project, &[("name", name.as_str())])
                .into_iter()
                .map(|id| vec![self.prop(id, "name")])
                .collect(),
            GraphQuery::ScopeFiles { prefix } => {
                let mut rows: Vec<Row> = self
                    .nodes
                    .iter()
                    .filter(|(id, _)| self.is_file(**id) && self.path_starts_with(**id, prefix))
                    .map(|(id, node)| {
                        vec![
                            s(node.label.as_str()),
                            self.prop(*id, "path"),
                            self.prop(*id, "name"),
                            self.prop(*id, "language"),
                            self.prop(*id, "modified"),
                            self.prop(*id, "headings"),
                        ]
                    })
                    .collect();
                rows.sort_by(|a, b| a[1].as_str().cmp(&b[1].as_str()));
                rows
            }
            GraphQuery::ScopeEdges { prefix } => self
                .edges
                .iter()
                .filter(|(a, _, _)| self.is_file(*a) && self.path_starts_with(*a, prefix))
                .map(|(a, t, b)| {
                    vec![
                        self.prop(*a, "path"),
                        s(t.as_str()),
                        self.label_of(*b)
                            .map(|l| s(l.as_str()))
                            .unwrap_or(Value::Null),
                        self.prop(*b, "name"),
                        self.prop(*b, "path"),
                        self.prop(*b, "line"),
                        self.prop(*b, "text"),
                        self.prop(*b, "status"),
                    ]
                })
                .collect(),
            GraphQuery::ScopeProjects { prefix } => {
                let mut rows: Vec<Row> = self
                    .edges
                    .iter()
                    .filter(|(a, t, b)| {
                        *t == EdgeType::Contains
                            && self.label_of(*a) == Some(NodeLabel::Project)
                            && self.path_starts_with(*b, prefix)
                    })
                    .map(|(a, _, b)| vec![self.prop(*a, "name"), self.prop(*b, "path")])
                    .collect();
                rows.sort_by(|x, y| {
                    (x[0].as_str(), x[1].as_str()).cmp(&(y[0].as_str(), y[1].as_str()))
                });
                rows
            }
        }
    }
}

impl GraphBackend for MemoryGraph {
    fn execute(&self, op: &GraphOp) -> Result<()> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.apply(op);
        Ok(())
    }

    fn query(&self, query: &GraphQuery) -> Result<Vec<Row>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.run(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::{DefinitionKind, FileLabel};
    use crate::ingest::TaskStatus;

    fn note(graph: &MemoryGraph, path: &str, name: &str) {
        graph
            .execute(&GraphOp::UpsertNote {
                path: path.into(),
                name: name.into(),
                modified: 0,
                headings: 0,
            })
            .unwrap();
    }

    #[test]
    fn test_upsert_is_keyed_by_path() {
        let g = MemoryGraph::new();
        note(&g, "/v/a.md", "a");
        note(&g, "/v/a.md", "a");
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_link_creates_placeholder_and_claim_reuses_it() {
        let g = MemoryGraph::new();
        note(&g, "/v/a.md", "a");
        g.execute(&GraphOp::Link {
            path: "/v/a.md".into(),
            target: "b".into(),
            embed: false,
        })
        .unwrap();
        assert_eq!(g.node_count(), 2);

        g.execute(&GraphOp::ClaimPlaceholder {
            path: "/v/b.md".into(),
            name: "b".into(),
        })
        .unwrap();
        note(&g, "/v/b.md", "b");
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_owned_nodes_are_detached_on_drop() {
        let g = MemoryGraph::new();
        g.execute(&GraphOp::UpsertCode {
            path: "/s/a.py".into(),
            name: "a.py".into(),
            language: "python".into(),
            modified: 0,
        })
        .unwrap();
        g.execute(&GraphOp::Define {
            path: "/s/a.py".into(),
            kind: DefinitionKind::Function,
            name: "f".into(),
            line: 1,
        })
        .unwrap();
        g.execute(&GraphOp::AddTask {
            label: FileLabel::Code,
            path: "/s/a.py".into(),
            text: "x".into(),
            line: 2,
            status: TaskStatus::Todo,
        })
        .unwrap();
        assert_eq!(g.node_count(), 3);

        g.execute(&GraphOp::DropOwnedNodes {
            label: FileLabel::Code,
            path: "/s/a.py".into(),
        })
        .unwrap();
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.dangling_edges(), 0);
    }

    #[test]
    fn test_match_on_missing_file_is_noop() {
        let g = MemoryGraph::new();
        g.execute(&GraphOp::Tag {
            path: "/nowhere.md".into(),
            tag: "t".into(),
        })
        .unwrap();
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn test_fingerprint_ignores_node_ids() {
        let a = MemoryGraph::new();
        note(&a, "/v/x.md", "x");
        note(&a, "/v/y.md", "y");
        let b = MemoryGraph::new();
        note(&b, "/v/y.md", "y");
        note(&b, "/v/x.md", "x");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
