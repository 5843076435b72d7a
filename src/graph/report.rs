//! Report bundle: diagrams and a navigable index for one scope.
//!
//! Bundle layout inside the output directory:
//! `index.md`, `dependencies.mmd`, `classes.mmd`, `packages.mmd`, `notes.mmd`,
//! `summary.json`. Rendering is a pure function of the snapshot and options.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::export::{mermaid_label, ExcludeSet, FileEntry, GraphSnapshot, IdMap};
use super::GraphBackend;
use crate::error::{LibrarianError, Result};

/// How much per-file detail diagrams carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Per-file counts only
    Low,
    /// Classes inlined, functions counted
    #[default]
    Medium,
    /// Classes and functions inlined with line numbers
    High,
}

impl DetailLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(DetailLevel::Low),
            "medium" => Some(DetailLevel::Medium),
            "high" => Some(DetailLevel::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Low => "low",
            DetailLevel::Medium => "medium",
            DetailLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub scope: String,
    pub exclude: Vec<String>,
    pub detail: DetailLevel,
}

/// Aggregate counts written to `summary.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub scope: String,
    pub detail: DetailLevel,
    pub notes: usize,
    pub code_files: usize,
    pub functions: usize,
    pub classes: usize,
    pub modules: usize,
    pub tags: usize,
    pub links: usize,
    pub tasks: usize,
    pub languages: BTreeMap<String, usize>,
    pub task_status: BTreeMap<String, usize>,
    pub projects: BTreeMap<String, usize>,
}

/// Rendered bundle, file name to content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBundle {
    pub files: BTreeMap<&'static str, String>,
    pub summary: ReportSummary,
}

pub const INDEX_FILE: &str = "index.md";
pub const DEPENDENCIES_FILE: &str = "dependencies.mmd";
pub const CLASSES_FILE: &str = "classes.mmd";
pub const PACKAGES_FILE: &str = "packages.mmd";
pub const NOTES_FILE: &str = "notes.mmd";
pub const SUMMARY_FILE: &str = "summary.json";

/// Load the scope and write the bundle into `out_dir`.
pub fn write_report(
    backend: &dyn GraphBackend,
    options: &ReportOptions,
    out_dir: &Path,
) -> Result<ReportBundle> {
    let exclude = ExcludeSet::new(&options.exclude)?;
    let snapshot = GraphSnapshot::load(backend, &options.scope, &exclude)?;
    let bundle = build_report(&snapshot, options.detail)?;

    std::fs::create_dir_all(out_dir).map_err(|e| LibrarianError::filesystem(out_dir, e))?;
    for (name, content) in &bundle.files {
        let path: PathBuf = out_dir.join(name);
        std::fs::write(&path, content).map_err(|e| LibrarianError::filesystem(&path, e))?;
    }
    tracing::info!(
        scope = %options.scope,
        files = snapshot.files.len(),
        out = %out_dir.display(),
        "report written"
    );
    Ok(bundle)
}

pub fn build_report(snapshot: &GraphSnapshot, detail: DetailLevel) -> Result<ReportBundle> {
    let summary = summarize(snapshot, detail);
    let mut files = BTreeMap::new();
    files.insert(DEPENDENCIES_FILE, dependencies_diagram(snapshot, detail));
    files.insert(CLASSES_FILE, classes_diagram(snapshot, detail));
    files.insert(PACKAGES_FILE, packages_diagram(snapshot, detail));
    files.insert(NOTES_FILE, notes_diagram(snapshot, detail));
    files.insert(INDEX_FILE, index_markdown(snapshot, &summary, detail));
    let mut json = serde_json::to_string_pretty(&summary)?;
    json.push('\n');
    files.insert(SUMMARY_FILE, json);
    Ok(ReportBundle { files, summary })
}

fn summarize(snapshot: &GraphSnapshot, detail: DetailLevel) -> ReportSummary {
    let mut summary = ReportSummary {
        scope: snapshot.scope.clone(),
        detail,
        ..Default::default()
    };
    let mut modules = BTreeSet::new();
    let mut tags = BTreeSet::new();
    for file in &snapshot.files {
        if file.is_note() {
            summary.notes += 1;
        } else {
            summary.code_files += 1;
        }
        if let Some(lang) = &file.language {
            *summary.languages.entry(lang.clone()).or_default() += 1;
        }
        if let Some(project) = &file.project {
            *summary.projects.entry(project.clone()).or_default() += 1;
        }
        summary.functions += file.functions.len();
        summary.classes += file.classes.len();
        summary.links += file.links.len();
        summary.tasks += file.tasks.len();
        for task in &file.tasks {
            *summary.task_status.entry(task.status.clone()).or_default() += 1;
        }
        modules.extend(file.imports.iter());
        tags.extend(file.tags.iter());
    }
    summary.modules = modules.len();
    summary.tags = tags.len();
    summary
}

/// Label for a code file node at the given detail.
fn code_label(file: &FileEntry, detail: DetailLevel) -> String {
    match detail {
        DetailLevel::Low => format!(
            "{}<br/>{} classes, {} functions",
            file.name,
            file.classes.len(),
            file.functions.len()
        ),
        DetailLevel::Medium => {
            let mut label = file.name.clone();
            for class in &file.classes {
                label.push_str(&format!("<br/>class {}", class.name));
            }
            label.push_str(&format!("<br/>{} functions", file.functions.len()));
            label
        }
        DetailLevel::High => {
            let mut label = file.name.clone();
            for class in &file.classes {
                label.push_str(&format!("<br/>class {} L{}", class.name, class.line));
            }
            for function in &file.functions {
                label.push_str(&format!("<br/>fn {} L{}", function.name, function.line));
            }
            label
        }
    }
}

fn dependencies_diagram(snapshot: &GraphSnapshot, detail: DetailLevel) -> String {
    let mut ids = IdMap::new("f");
    let mut out = String::from("flowchart LR\n");
    let mut modules = BTreeMap::new();
    let mut edges = BTreeSet::new();

    for file in snapshot.code() {
        let id = ids.id(&file.path);
        out.push_str(&format!("  {}[{}]\n", id, mermaid_label(&code_label(file, detail))));
    }
    for file in snapshot.code() {
        let from = ids.id(&file.path);
        for module in &file.imports {
            match snapshot.import_target(module) {
                Some(target) if target.path != file.path => {
                    edges.insert(format!("  {} --> {}\n", from, ids.id(&target.path)));
                }
                Some(_) => {}
                None => {
                    let id = ids.id(&format!("module:{}", module));
                    modules.insert(id.clone(), module.clone());
                    edges.insert(format!("  {} -.-> {}\n", from, id));
                }
            }
        }
    }
    for (id, module) in &modules {
        out.push_str(&format!("  {}(({}))\n", id, mermaid_label(module)));
    }
    for edge in edges {
        out.push_str(&edge);
    }
    out
}

fn classes_diagram(snapshot: &GraphSnapshot, detail: DetailLevel) -> String {
    let mut ids = IdMap::new("c");
    let mut out = String::from("classDiagram\n");
    for file in snapshot.code() {
        if file.classes.is_empty() && detail != DetailLevel::High {
            continue;
        }
        let file_id = ids.id(&file.path);
        out.push_str(&format!("  class {}[{}]\n", file_id, mermaid_label(&file.name)));
        match detail {
            DetailLevel::Low => {
                out.push_str(&format!("  {} : +{} classes\n", file_id, file.classes.len()));
                out.push_str(&format!(
                    "  {} : +{} functions\n",
                    file_id,
                    file.functions.len()
                ));
            }
            DetailLevel::Medium | DetailLevel::High => {
                if detail == DetailLevel::Medium {
                    out.push_str(&format!(
                        "  {} : +{} functions\n",
                        file_id,
                        file.functions.len()
                    ));
                } else {
                    for function in &file.functions {
                        out.push_str(&format!(
                            "  {} : +{}() L{}\n",
                            file_id, function.name, function.line
                        ));
                    }
                }
                for class in &file.classes {
                    let class_id = ids.id(&format!("{}#{}", file.path, class.name));
                    out.push_str(&format!(
                        "  class {}[{}]\n",
                        class_id,
                        mermaid_label(&class.name)
                    ));
                    if detail == DetailLevel::High {
                        out.push_str(&format!("  {} : line {}\n", class_id, class.line));
                    }
                    out.push_str(&format!("  {} *-- {}\n", file_id, class_id));
                }
            }
        }
    }
    out
}

/// Directory of a file relative to the scope, `.` for the scope itself.
fn relative_dir(scope: &str, path: &str) -> String {
    let rel = path.strip_prefix(scope).unwrap_or(path).trim_start_matches('/');
    match Path::new(rel).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    }
}

fn packages_diagram(snapshot: &GraphSnapshot, detail: DetailLevel) -> String {
    let mut ids = IdMap::new("p");
    let mut out = String::from("flowchart TD\n");

    // project -> directory -> files
    let mut tree: BTreeMap<String, BTreeMap<String, Vec<&FileEntry>>> = BTreeMap::new();
    for file in &snapshot.files {
        let project = file
            .project
            .clone()
            .unwrap_or_else(|| "(no project)".to_string());
        tree.entry(project)
            .or_default()
            .entry(relative_dir(&snapshot.scope, &file.path))
            .or_default()
            .push(file);
    }

    for (project, dirs) in &tree {
        let project_id = ids.id(&format!("project:{}", project));
        out.push_str(&format!("  subgraph {}[{}]\n", project_id, mermaid_label(project)));
        for (dir, files) in dirs {
            let dir_id = ids.id(&format!("dir:{}:{}", project, dir));
            if detail == DetailLevel::Low {
                out.push_str(&format!(
                    "    {}[{}]\n",
                    dir_id,
                    mermaid_label(&format!("{} ({} files)", dir, files.len()))
                ));
                continue;
            }
            out.push_str(&format!("    subgraph {}[{}]\n", dir_id, mermaid_label(dir)));
            for file in files {
                out.push_str(&format!(
                    "      {}[{}]\n",
                    ids.id(&file.path),
                    mermaid_label(&file.name)
                ));
            }
            out.push_str("    end\n");
        }
        out.push_str("  end\n");
    }
    out
}

fn notes_diagram(snapshot: &GraphSnapshot, detail: DetailLevel) -> String {
    let mut ids = IdMap::new("n");
    let mut out = String::from("flowchart LR\n");
    let mut extra = BTreeMap::new();
    let mut edges = BTreeSet::new();

    for note in snapshot.notes() {
        let label = if detail == DetailLevel::High && !note.tasks.is_empty() {
            format!("{}<br/>{} tasks", note.name, note.tasks.len())
        } else {
            note.name.clone()
        };
        out.push_str(&format!("  {}[{}]\n", ids.id(&note.path), mermaid_label(&label)));
    }
    for note in snapshot.notes() {
        let from = ids.id(&note.path);
        for (targets, arrow) in [(&note.links, "-->"), (&note.embeds, "-.->")] {
            for target in targets {
                let to = match snapshot.note_path(target) {
                    Some(path) => ids.id(path),
                    None => {
                        let id = ids.id(&format!("note:{}", target));
                        extra.insert(id.clone(), format!("  {}({})\n", id, mermaid_label(target)));
                        id
                    }
                };
                edges.insert(format!("  {} {} {}\n", from, arrow, to));
            }
        }
        if detail != DetailLevel::Low {
            for tag in &note.tags {
                let id = ids.id(&format!("tag:{}", tag));
                extra.insert(
                    id.clone(),
                    format!("  {}{{{{{}}}}}\n", id, mermaid_label(&format!("#{}", tag))),
                );
                edges.insert(format!("  {} --- {}\n", from, id));
            }
        }
    }
    for line in extra.values() {
        out.push_str(line);
    }
    for edge in edges {
        out.push_str(&edge);
    }
    out
}

fn format_date(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn index_markdown(snapshot: &GraphSnapshot, summary: &ReportSummary, detail: DetailLevel) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Report: `{}`\n\n", snapshot.scope));
    out.push_str(&format!("Detail level: {}\n\n", detail.as_str()));

    out.push_str("## Summary\n\n| Item | Count |\n|---|---|\n");
    for (item, count) in [
        ("Notes", summary.notes),
        ("Code files", summary.code_files),
        ("Functions", summary.functions),
        ("Classes", summary.classes),
        ("Modules", summary.modules),
        ("Tags", summary.tags),
        ("Links", summary.links),
        ("Tasks", summary.tasks),
    ] {
        out.push_str(&format!("| {} | {} |\n", item, count));
    }

    out.push_str("\n## Diagrams\n\n");
    for (title, file) in [
        ("Dependencies", DEPENDENCIES_FILE),
        ("Classes", CLASSES_FILE),
        ("Packages", PACKAGES_FILE),
        ("Notes", NOTES_FILE),
    ] {
        out.push_str(&format!("- [{}]({})\n", title, file));
    }

    if !summary.languages.is_empty() {
        out.push_str("\n## Languages\n\n");
        for (lang, count) in &summary.languages {
            out.push_str(&format!("- {}: {}\n", lang, count));
        }
    }

    out.push_str("\n## Files\n\n| File | Kind | Project | Modified |\n|---|---|---|---|\n");
    for file in &snapshot.files {
        out.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            file.path,
            file.language.as_deref().unwrap_or("note"),
            file.project.as_deref().unwrap_or("-"),
            format_date(file.modified)
        ));
    }

    if detail != DetailLevel::Low {
        let tasks: Vec<(&FileEntry, _)> = snapshot
            .files
            .iter()
            .flat_map(|f| f.tasks.iter().map(move |t| (f, t)))
            .collect();
        if !tasks.is_empty() {
            out.push_str("\n## Tasks\n\n");
            for (file, task) in tasks {
                let check = if task.status == "DONE" { "x" } else { " " };
                out.push_str(&format!(
                    "- [{}] {} {} (`{}`:{})\n",
                    check, task.status, task.text, file.path, task.line
                ));
            }
        }
    }

    if detail == DetailLevel::High {
        out.push_str("\n## Definitions\n");
        for file in snapshot.code() {
            if file.functions.is_empty() && file.classes.is_empty() {
                continue;
            }
            out.push_str(&format!("\n### `{}`\n\n", file.path));
            for class in &file.classes {
                out.push_str(&format!("- class `{}` line {}\n", class.name, class.line));
            }
            for function in &file.functions {
                out.push_str(&format!("- fn `{}` line {}\n", function.name, function.line));
            }
        }
    }
    out
}
