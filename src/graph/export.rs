//! Scoped graph snapshots and single-artifact exports.
//!
//! A [`GraphSnapshot`] holds every file node under a path prefix together
//! with its outgoing edges, read through the scope queries. Exports and the
//! report bundle render from the snapshot only, so output is deterministic for
//! a fixed graph and option set.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::query::{GraphQuery, Row, Value};
use super::schema::{EdgeType, NodeLabel};
use super::GraphBackend;
use crate::error::{LibrarianError, Result};

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Snapshot as pretty JSON
    Json,
    /// Graphviz DOT
    Dot,
    /// Mermaid flowchart
    Mermaid,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "dot" => Some(ExportFormat::Dot),
            "mermaid" | "mmd" => Some(ExportFormat::Mermaid),
            _ => None,
        }
    }
}

/// Path exclusion patterns for exports and reports.
///
/// A pattern matches either the absolute path or the path relative to the
/// scope, so `tests/**` and `**/tests/**` both work.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    set: GlobSet,
    empty: bool,
}

impl ExcludeSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                LibrarianError::config(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| LibrarianError::config(format!("invalid exclude patterns: {}", e)))?;
        Ok(Self {
            set,
            empty: patterns.is_empty(),
        })
    }

    pub fn none() -> Self {
        Self {
            set: GlobSet::empty(),
            empty: true,
        }
    }

    pub fn is_excluded(&self, path: &str, scope: &str) -> bool {
        if self.empty {
            return false;
        }
        if self.set.is_match(path) {
            return true;
        }
        let relative = path.strip_prefix(scope).unwrap_or(path);
        self.set.is_match(relative.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SymbolEntry {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TaskEntry {
    pub line: usize,
    pub status: String,
    pub text: String,
}

/// One file node with its outgoing edges folded in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileEntry {
    /// `Note` or `Code`
    pub label: String,
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub modified: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headings: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub embeds: Vec<String>,
    pub imports: Vec<String>,
    pub functions: Vec<SymbolEntry>,
    pub classes: Vec<SymbolEntry>,
    pub tasks: Vec<TaskEntry>,
}

impl FileEntry {
    pub fn is_note(&self) -> bool {
        self.label == NodeLabel::Note.as_str()
    }

    pub fn is_code(&self) -> bool {
        self.label == NodeLabel::Code.as_str()
    }

    /// File stem, used to resolve imports against in-scope code files.
    pub fn stem(&self) -> &str {
        Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub scope: String,
    /// Sorted by path
    pub files: Vec<FileEntry>,
}

fn text(row: &Row, idx: usize) -> Option<String> {
    row.get(idx).and_then(Value::as_str).map(str::to_string)
}

fn int(row: &Row, idx: usize) -> Option<i64> {
    row.get(idx).and_then(Value::as_int)
}

impl GraphSnapshot {
    /// Read every file under `scope` that is not excluded.
    pub fn load(backend: &dyn GraphBackend, scope: &str, exclude: &ExcludeSet) -> Result<Self> {
        let prefix = scope.to_string();
        let mut files: BTreeMap<String, FileEntry> = BTreeMap::new();

        for row in backend.query(&GraphQuery::ScopeFiles {
            prefix: prefix.clone(),
        })? {
            let (Some(label), Some(path)) = (text(&row, 0), text(&row, 1)) else {
                continue;
            };
            if exclude.is_excluded(&path, scope) {
                continue;
            }
            let entry = FileEntry {
                label,
                name: text(&row, 2).unwrap_or_default(),
                language: text(&row, 3),
                modified: int(&row, 4).unwrap_or(0),
                headings: int(&row, 5),
                path: path.clone(),
                ..Default::default()
            };
            files.insert(path, entry);
        }

        for row in backend.query(&GraphQuery::ScopeEdges {
            prefix: prefix.clone(),
        })? {
            let (Some(path), Some(edge)) = (text(&row, 0), text(&row, 1)) else {
                continue;
            };
            let Some(entry) = files.get_mut(&path) else {
                continue;
            };
            let target_label = text(&row, 2);
            let name = text(&row, 3).unwrap_or_default();
            let line = int(&row, 5).unwrap_or(0).max(0) as usize;
            match edge.as_str() {
                e if e == EdgeType::LinksTo.as_str() => entry.links.push(name),
                e if e == EdgeType::Embeds.as_str() => entry.embeds.push(name),
                e if e == EdgeType::Tagged.as_str() => entry.tags.push(name),
                e if e == EdgeType::Imports.as_str() => entry.imports.push(name),
                e if e == EdgeType::Defines.as_str() => {
                    let symbol = SymbolEntry { name, line };
                    if target_label.as_deref() == Some(NodeLabel::Class.as_str()) {
                        entry.classes.push(symbol);
                    } else {
                        entry.functions.push(symbol);
                    }
                }
                e if e == EdgeType::HasTask.as_str() => entry.tasks.push(TaskEntry {
                    line,
                    status: text(&row, 7).unwrap_or_default(),
                    text: text(&row, 6).unwrap_or_default(),
                }),
                _ => {}
            }
        }

        for row in backend.query(&GraphQuery::ScopeProjects { prefix })? {
            if let (Some(project), Some(path)) = (text(&row, 0), text(&row, 1)) {
                if let Some(entry) = files.get_mut(&path) {
                    entry.project = Some(project);
                }
            }
        }

        let files = files
            .into_values()
            .map(|mut f| {
                sort_dedup(&mut f.tags);
                sort_dedup(&mut f.links);
                sort_dedup(&mut f.embeds);
                sort_dedup(&mut f.imports);
                sort_dedup(&mut f.functions);
                sort_dedup(&mut f.classes);
                sort_dedup(&mut f.tasks);
                f
            })
            .collect();

        Ok(Self {
            scope: scope.to_string(),
            files,
        })
    }

    pub fn notes(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(|f| f.is_note())
    }

    pub fn code(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(|f| f.is_code())
    }

    /// In-scope note path for a link target name, if one exists.
    pub fn note_path(&self, name: &str) -> Option<&str> {
        self.notes()
            .find(|f| f.name == name)
            .map(|f| f.path.as_str())
    }

    /// In-scope code file an import resolves to, by last module segment.
    pub fn import_target(&self, module: &str) -> Option<&FileEntry> {
        let last = module
            .rsplit(|c: char| c == '.' || c == '/' || c == ':')
            .find(|s| !s.is_empty())?;
        self.code().find(|f| f.stem() == last)
    }

    pub fn projects(&self) -> BTreeMap<&str, Vec<&FileEntry>> {
        let mut map: BTreeMap<&str, Vec<&FileEntry>> = BTreeMap::new();
        for file in &self.files {
            if let Some(project) = file.project.as_deref() {
                map.entry(project).or_default().push(file);
            }
        }
        map
    }
}

fn sort_dedup<T: Ord>(items: &mut Vec<T>) {
    items.sort();
    items.dedup();
}

/// Deterministic short node ids for diagram languages that need identifiers.
#[derive(Debug, Default)]
pub(crate) struct IdMap {
    prefix: &'static str,
    ids: BTreeMap<String, String>,
}

impl IdMap {
    pub(crate) fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            ids: BTreeMap::new(),
        }
    }

    pub(crate) fn id(&mut self, key: &str) -> String {
        let next = self.ids.len();
        let prefix = self.prefix;
        self.ids
            .entry(key.to_string())
            .or_insert_with(|| format!("{}{}", prefix, next))
            .clone()
    }
}

/// Quote a label for a Mermaid node shape.
pub(crate) fn mermaid_label(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "#quot;"))
}

fn dot_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a snapshot in one export format.
pub fn render(snapshot: &GraphSnapshot, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(snapshot)?),
        ExportFormat::Dot => Ok(to_dot(snapshot)),
        ExportFormat::Mermaid => Ok(to_mermaid(snapshot)),
    }
}

fn to_dot(snapshot: &GraphSnapshot) -> String {
    let mut out = String::from("digraph librarian {\n  rankdir=LR;\n");
    let mut extra: BTreeSet<String> = BTreeSet::new();
    let mut edges: Vec<String> = Vec::new();

    for file in &snapshot.files {
        let shape = if file.is_note() { "note" } else { "box" };
        out.push_str(&format!(
            "  {} [label={}, shape={}];\n",
            dot_quote(&file.path),
            dot_quote(&file.name),
            shape
        ));
        for (targets, edge, style) in [
            (&file.links, EdgeType::LinksTo, "solid"),
            (&file.embeds, EdgeType::Embeds, "dashed"),
        ] {
            for target in targets {
                let to = match snapshot.note_path(target) {
                    Some(path) => path.to_string(),
                    None => {
                        extra.insert(format!(
                            "  {} [label={}, shape=note, style=dotted];\n",
                            dot_quote(&format!("note:{}", target)),
                            dot_quote(target)
                        ));
                        format!("note:{}", target)
                    }
                };
                edges.push(format!(
                    "  {} -> {} [label={}, style={}];\n",
                    dot_quote(&file.path),
                    dot_quote(&to),
                    edge.as_str(),
                    style
                ));
            }
        }
        for tag in &file.tags {
            let key = format!("tag:{}", tag);
            extra.insert(format!(
                "  {} [label={}, shape=hexagon];\n",
                dot_quote(&key),
                dot_quote(&format!("#{}", tag))
            ));
            edges.push(format!(
                "  {} -> {} [label={}];\n",
                dot_quote(&file.path),
                dot_quote(&key),
                EdgeType::Tagged.as_str()
            ));
        }
        for module in &file.imports {
            let key = format!("module:{}", module);
            extra.insert(format!(
                "  {} [label={}, shape=ellipse];\n",
                dot_quote(&key),
                dot_quote(module)
            ));
            edges.push(format!(
                "  {} -> {} [label={}];\n",
                dot_quote(&file.path),
                dot_quote(&key),
                EdgeType::Imports.as_str()
            ));
        }
    }

    for line in extra {
        out.push_str(&line);
    }
    for line in edges {
        out.push_str(&line);
    }
    out.push_str("}\n");
    out
}

fn to_mermaid(snapshot: &GraphSnapshot) -> String {
    let mut ids = IdMap::new("n");
    let mut out = String::from("flowchart LR\n");
    let mut extra: BTreeSet<String> = BTreeSet::new();
    let mut edges: Vec<String> = Vec::new();

    for file in &snapshot.files {
        let id = ids.id(&file.path);
        if file.is_note() {
            out.push_str(&format!("  {}[{}]\n", id, mermaid_label(&file.name)));
        } else {
            out.push_str(&format!("  {}[/{}/]\n", id, mermaid_label(&file.name)));
        }
    }
    for file in &snapshot.files {
        let from = ids.id(&file.path);
        for (targets, arrow) in [(&file.links, "-->"), (&file.embeds, "-.->")] {
            for target in targets {
                let to = match snapshot.note_path(target) {
                    Some(path) => ids.id(path),
                    None => {
                        let id = ids.id(&format!("note:{}", target));
                        extra.insert(format!("  {}({})\n", id, mermaid_label(target)));
                        id
                    }
                };
                edges.push(format!("  {} {} {}\n", from, arrow, to));
            }
        }
        for module in &file.imports {
            let id = ids.id(&format!("module:{}", module));
            extra.insert(format!("  {}(({}))\n", id, mermaid_label(module)));
            edges.push(format!("  {} --> {}\n", from, id));
        }
    }

    for line in extra {
        out.push_str(&line);
    }
    for line in edges {
        out.push_str(&line);
    }
    out
}
