//! Read-only graph queries.
//!
//! Each [`GraphQuery`] renders to Cypher with a fixed column layout, so a
//! remote reply and the in-memory backend produce the same [`Row`] shape.
//! The typed helpers at the bottom turn rows into sorted results.

use serde::Serialize;
use std::collections::BTreeSet;

use super::ops::lit;
use super::schema::{EdgeType, NodeLabel};
use super::GraphBackend;
use crate::error::Result;

/// A scalar cell in a query reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.parse().ok(),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphQuery {
    /// Notes with a path and no incoming LINKS_TO. Columns: path.
    Orphans,
    /// Notes linking to the named note. Columns: path.
    Backlinks { name: String },
    /// Notes tagged exactly `tag`. Columns: path.
    NotesByTag { tag: String },
    /// Functions with this exact name. Columns: path, line.
    Functions { name: String },
    /// Classes with this exact name. Columns: path, line.
    Classes { name: String },
    /// Linked, back-linked and tag-sharing notes. Columns: name, path.
    Related { name: String },
    /// Columns: count. Notes count only when they have a path.
    CountNodes { label: NodeLabel },
    /// Pathless notes created by unresolved links. Columns: count.
    CountPlaceholders,
    /// Columns: count.
    CountEdges { edge: EdgeType },
    /// Whether a project exists. Columns: name.
    Project { name: String },
    /// File nodes under a prefix. Columns: label, path, name, language, modified, headings.
    ScopeFiles { prefix: String },
    /// Outgoing edges of files under a prefix.
    /// Columns: path, type, target label, target name, target path, line, text, status.
    ScopeEdges { prefix: String },
    /// Project membership of files under a prefix. Columns: project, path.
    ScopeProjects { prefix: String },
}

impl GraphQuery {
    pub fn to_cypher(&self) -> String {
        match self {
            GraphQuery::Orphans => "MATCH (n:Note) WHERE n.path IS NOT NULL \
                 OPTIONAL MATCH (m:Note)-[:LINKS_TO]->(n) \
                 WITH n, count(m) AS incoming WHERE incoming = 0 \
                 RETURN n.path ORDER BY n.path"
                .to_string(),
            GraphQuery::Backlinks { name } => format!(
                "MATCH (m:Note)-[:LINKS_TO]->(n:Note {{name: {}}}) WHERE m.path IS NOT NULL \
                 RETURN DISTINCT m.path ORDER BY m.path",
                lit(name)
            ),
            GraphQuery::NotesByTag { tag } => format!(
                "MATCH (n:Note)-[:TAGGED]->(:Tag {{name: {}}}) RETURN n.path ORDER BY n.path",
                lit(tag)
            ),
            GraphQuery::Functions { name } => format!(
                "MATCH (d:Function {{name: {}}}) RETURN d.path, d.line ORDER BY d.path, d.line",
                lit(name)
            ),
            GraphQuery::Classes { name } => format!(
                "MATCH (d:Class {{name: {}}}) RETURN d.path, d.line ORDER BY d.path, d.line",
                lit(name)
            ),
            GraphQuery::Related { name } => {
                let n = lit(name);
                format!(
                    "MATCH (n:Note {{name: {n}}})-[:LINKS_TO]->(m:Note) WHERE m <> n \
                     RETURN m.name AS name, m.path AS path \
                     UNION MATCH (n:Note {{name: {n}}})<-[:LINKS_TO]-(m:Note) WHERE m <> n \
                     RETURN m.name AS name, m.path AS path \
                     UNION MATCH (n:Note {{name: {n}}})-[:TAGGED]->(:Tag)<-[:TAGGED]-(m:Note) WHERE m <> n \
                     RETURN m.name AS name, m.path AS path"
                )
            }
            GraphQuery::CountNodes {
                label: NodeLabel::Note,
            } => "MATCH (n:Note) WHERE n.path IS NOT NULL RETURN count(n)".to_string(),
            GraphQuery::CountNodes { label } => {
                format!("MATCH (n:{}) RETURN count(n)", label.as_str())
            }
            GraphQuery::CountPlaceholders => {
                "MATCH (n:Note) WHERE n.path IS NULL RETURN count(n)".to_string()
            }
            GraphQuery::CountEdges { edge } => {
                format!("MATCH ()-[r:{}]->() RETURN count(r)", edge.as_str())
            }
            GraphQuery::Project { name } => {
                format!("MATCH (p:Project {{name: {}}}) RETURN p.name", lit(name))
            }
            GraphQuery::ScopeFiles { prefix } => format!(
                "MATCH (f) WHERE (f:Note OR f:Code) AND f.path STARTS WITH {} \
                 RETURN labels(f)[0], f.path, f.name, f.language, f.modified, f.headings ORDER BY f.path",
                lit(prefix)
            ),
            GraphQuery::ScopeEdges { prefix } => format!(
                "MATCH (f)-[r]->(t) WHERE (f:Note OR f:Code) AND f.path STARTS WITH {} \
                 RETURN f.path, type(r), labels(t)[0], t.name, t.path, t.line, t.text, t.status",
                lit(prefix)
            ),
            GraphQuery::ScopeProjects { prefix } => format!(
                "MATCH (p:Project)-[:CONTAINS]->(f) WHERE f.path STARTS WITH {} \
                 RETURN p.name, f.path ORDER BY p.name, f.path",
                lit(prefix)
            ),
        }
    }
}

/// A definition site returned by function/class lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub path: String,
    pub line: usize,
}

/// A note returned by `related`. Placeholders have no path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NoteRef {
    pub name: String,
    pub path: Option<String>,
}

fn string_column(rows: Vec<Row>) -> Vec<String> {
    let set: BTreeSet<String> = rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter_map(|v| match v {
            Value::Str(s) => Some(s),
            _ => None,
        })
        .collect();
    set.into_iter().collect()
}

fn locations(rows: Vec<Row>) -> Vec<Location> {
    let set: BTreeSet<Location> = rows
        .into_iter()
        .filter_map(|row| {
            let path = row.first()?.as_str()?.to_string();
            let line = row.get(1).and_then(Value::as_int).unwrap_or(0).max(0) as usize;
            Some(Location { path, line })
        })
        .collect();
    set.into_iter().collect()
}

pub fn orphans(backend: &dyn GraphBackend) -> Result<Vec<String>> {
    Ok(string_column(backend.query(&GraphQuery::Orphans)?))
}

pub fn backlinks(backend: &dyn GraphBackend, name: &str) -> Result<Vec<String>> {
    Ok(string_column(backend.query(&GraphQuery::Backlinks {
        name: name.to_string(),
    })?))
}

pub fn notes_by_tag(backend: &dyn GraphBackend, tag: &str) -> Result<Vec<String>> {
    let tag = tag.trim_start_matches('#');
    Ok(string_column(backend.query(&GraphQuery::NotesByTag {
        tag: tag.to_string(),
    })?))
}

pub fn functions(backend: &dyn GraphBackend, name: &str) -> Result<Vec<Location>> {
    Ok(locations(backend.query(&GraphQuery::Functions {
        name: name.to_string(),
    })?))
}

pub fn classes(backend: &dyn GraphBackend, name: &str) -> Result<Vec<Location>> {
    Ok(locations(backend.query(&GraphQuery::Classes {
        name: name.to_string(),
    })?))
}

pub fn related(backend: &dyn GraphBackend, name: &str) -> Result<Vec<NoteRef>> {
    let rows = backend.query(&GraphQuery::Related {
        name: name.to_string(),
    })?;
    let set: BTreeSet<NoteRef> = rows
        .into_iter()
        .filter_map(|row| {
            let name = row.first()?.as_str()?.to_string();
            let path = row.get(1).and_then(Value::as_str).map(str::to_string);
            Some(NoteRef { name, path })
        })
        .collect();
    Ok(set.into_iter().collect())
}

pub fn project_exists(backend: &dyn GraphBackend, name: &str) -> Result<bool> {
    let rows = backend.query(&GraphQuery::Project {
        name: name.to_string(),
    })?;
    Ok(!rows.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphans_ignore_placeholders() {
        let cypher = GraphQuery::Orphans.to_cypher();
        assert!(cypher.contains("n.path IS NOT NULL"));
        assert!(cypher.contains("incoming = 0"));
    }

    #[test]
    fn test_note_counts_split_on_path() {
        let notes = GraphQuery::CountNodes {
            label: NodeLabel::Note,
        }
        .to_cypher();
        assert!(notes.contains("n.path IS NOT NULL"));
        let tasks = GraphQuery::CountNodes {
            label: NodeLabel::Task,
        }
        .to_cypher();
        assert_eq!(tasks, "MATCH (n:Task) RETURN count(n)");
        assert!(GraphQuery::CountPlaceholders
            .to_cypher()
            .contains("n.path IS NULL"));
    }

    #[test]
    fn test_lookup_literals_are_escaped() {
        let cypher = GraphQuery::Functions {
            name: "it's".into(),
        }
        .to_cypher();
        assert!(cypher.contains("{name: 'it\\'s'}"));
    }

    #[test]
    fn test_related_unions_three_sources() {
        let cypher = GraphQuery::Related { name: "A".into() }.to_cypher();
        assert_eq!(cypher.matches("UNION").count(), 2);
        assert_eq!(cypher.matches("WHERE m <> n").count(), 3);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Str("12".into()).as_int(), Some(12));
        assert_eq!(Value::Int(3).as_int(), Some(3));
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(1).as_str(), None);
    }
}
