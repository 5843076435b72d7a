//! Sync engine: metadata records to graph operations.
//!
//! Per file the sequence is always the same, in both modes:
//! 1. claim a same-named placeholder (notes only), then upsert the file node
//! 2. drop owned nodes, owned outgoing edges and project membership
//! 3. recreate links, tags, tasks, definitions and imports
//! 4. attach the file to its project, if it is under a project root
//!
//! Replaying the sequence for unchanged content leaves the graph unchanged.

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::ops::GraphOp;
use super::schema::{DefinitionKind, FileLabel};
use super::GraphBackend;
use crate::diagnostics::{DiagnosticStage, ScanDiagnostic};
use crate::error::{LibrarianError, Result};
use crate::ingest::FileMetadata;

/// Progress callback: (completed, total).
pub type SyncProgress = dyn Fn(usize, usize) + Send + Sync;

/// Configured project-root prefixes.
#[derive(Debug, Clone, Default)]
pub struct ProjectRoots {
    roots: Vec<PathBuf>,
}

impl ProjectRoots {
    pub fn new(roots: &[PathBuf]) -> Self {
        let mut roots = roots.to_vec();
        // Longest prefix wins when roots nest.
        roots.sort_by_key(|r| std::cmp::Reverse(r.components().count()));
        Self { roots }
    }

    /// Project for a file: the first directory below the matching root.
    ///
    /// Files directly inside a root belong to no project.
    pub fn project_for(&self, path: &str) -> Option<String> {
        let path = Path::new(path);
        self.roots.iter().find_map(|root| {
            let rel = path.strip_prefix(root).ok()?;
            let mut components = rel.components();
            let first = match components.next()? {
                Component::Normal(name) => name.to_string_lossy().into_owned(),
                _ => return None,
            };
            components.next()?;
            Some(first)
        })
    }
}

/// How operations reach the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Each op is issued immediately; files sync in parallel.
    Direct,
    /// Ops are serialized in sorted path order into a command stream.
    Dump,
}

/// Outcome of syncing a batch of records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub succeeded: usize,
    pub failed: usize,
    pub operations: usize,
    pub diagnostics: Vec<ScanDiagnostic>,
}

/// Operations that bring the graph in line with one file's metadata.
pub fn file_ops(meta: &FileMetadata, projects: &ProjectRoots) -> Vec<GraphOp> {
    let mut ops = Vec::new();
    let path = meta.path().to_string();
    let label = match meta {
        FileMetadata::Note(note) => {
            ops.push(GraphOp::ClaimPlaceholder {
                path: path.clone(),
                name: note.name.clone(),
            });
            ops.push(GraphOp::UpsertNote {
                path: path.clone(),
                name: note.name.clone(),
                modified: note.modified,
                headings: note.heading_count(),
            });
            FileLabel::Note
        }
        FileMetadata::Code(code) => {
            ops.push(GraphOp::UpsertCode {
                path: path.clone(),
                name: code.name.clone(),
                language: code.language.as_str().to_string(),
                modified: code.modified,
            });
            FileLabel::Code
        }
    };

    ops.push(GraphOp::DropOwnedNodes {
        label,
        path: path.clone(),
    });
    ops.push(GraphOp::DropOwnedEdges {
        label,
        path: path.clone(),
    });
    ops.push(GraphOp::DropMembership {
        label,
        path: path.clone(),
    });

    match meta {
        FileMetadata::Note(note) => {
            for target in &note.links {
                ops.push(GraphOp::Link {
                    path: path.clone(),
                    target: target.clone(),
                    embed: false,
                });
            }
            for target in &note.embeds {
                ops.push(GraphOp::Link {
                    path: path.clone(),
                    target: target.clone(),
                    embed: true,
                });
            }
            for tag in &note.tags {
                ops.push(GraphOp::Tag {
                    path: path.clone(),
                    tag: tag.clone(),
                });
            }
        }
        FileMetadata::Code(code) => {
            for (kind, symbols) in [
                (DefinitionKind::Function, &code.functions),
                (DefinitionKind::Class, &code.classes),
            ] {
                for symbol in symbols {
                    ops.push(GraphOp::Define {
                        path: path.clone(),
                        kind,
                        name: symbol.name.clone(),
                        line: symbol.line,
                    });
                }
            }
            for module in &code.imports {
                ops.push(GraphOp::Import {
                    path: path.clone(),
                    module: module.clone(),
                });
            }
        }
    }

    for task in meta.tasks() {
        ops.push(GraphOp::AddTask {
            label,
            path: path.clone(),
            text: task.text.clone(),
            line: task.line,
            status: task.status,
        });
    }

    if let Some(project) = projects.project_for(&path) {
        ops.push(GraphOp::Contain {
            label,
            path,
            project,
        });
    }
    ops
}

/// Operations that remove a path under either file label.
///
/// The file may already be gone from disk, so its label is unknown.
pub fn delete_ops(path: &str) -> Vec<GraphOp> {
    [FileLabel::Note, FileLabel::Code]
        .into_iter()
        .flat_map(|label| {
            [
                GraphOp::DropOwnedNodes {
                    label,
                    path: path.to_string(),
                },
                GraphOp::DeleteNode {
                    label,
                    path: path.to_string(),
                },
            ]
        })
        .collect()
}

/// Drives a [`GraphBackend`] with file sync sequences.
pub struct SyncEngine<'a> {
    backend: &'a dyn GraphBackend,
    projects: ProjectRoots,
    mode: SyncMode,
}

impl<'a> SyncEngine<'a> {
    pub fn new(backend: &'a dyn GraphBackend, projects: ProjectRoots, mode: SyncMode) -> Self {
        Self {
            backend,
            projects,
            mode,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Apply one file's sequence. The first failing op aborts the rest.
    ///
    /// Returns the number of ops applied.
    pub fn sync_file(&self, meta: &FileMetadata) -> Result<usize> {
        let ops = file_ops(meta, &self.projects);
        self.apply(&ops)
    }

    /// Remove a file and everything it owns.
    pub fn delete_file(&self, path: &str) -> Result<usize> {
        self.apply(&delete_ops(path))
    }

    fn apply(&self, ops: &[GraphOp]) -> Result<usize> {
        for op in ops {
            self.backend.execute(op)?;
        }
        Ok(ops.len())
    }

    /// Sync a batch of records.
    ///
    /// Dump mode is sequential in sorted path order. Direct mode runs files in
    /// parallel on `pool`. Per-file failures are counted; a connection failure
    /// stops remaining files and is returned as the error.
    pub fn sync_all(
        &self,
        records: &[FileMetadata],
        pool: Option<&rayon::ThreadPool>,
        progress: Option<&SyncProgress>,
    ) -> Result<SyncReport> {
        let mut ordered: Vec<&FileMetadata> = records.iter().collect();
        ordered.sort_by(|a, b| a.path().cmp(b.path()));
        let total = ordered.len();

        let report = Mutex::new(SyncReport::default());
        let completed = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let fatal: Mutex<Option<LibrarianError>> = Mutex::new(None);

        let run_one = |meta: &&FileMetadata| {
            if abort.load(Ordering::SeqCst) {
                return;
            }
            let outcome = self.sync_file(meta);
            let mut report = match report.lock() {
                Ok(r) => r,
                Err(poisoned) => poisoned.into_inner(),
            };
            match outcome {
                Ok(applied) => {
                    report.succeeded += 1;
                    report.operations += applied;
                }
                Err(err @ LibrarianError::Connection { .. }) => {
                    abort.store(true, Ordering::SeqCst);
                    if let Ok(mut slot) = fatal.lock() {
                        slot.get_or_insert(err);
                    }
                }
                Err(err) => {
                    tracing::warn!(path = meta.path(), error = %err, "sync failed");
                    report.failed += 1;
                    report.diagnostics.push(ScanDiagnostic::error(
                        meta.path(),
                        DiagnosticStage::Sync,
                        err.to_string(),
                    ));
                }
            }
            drop(report);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(cb) = progress {
                cb(done, total);
            }
        };

        match (self.mode, pool) {
            (SyncMode::Direct, Some(pool)) => pool.install(|| ordered.par_iter().for_each(run_one)),
            _ => ordered.iter().for_each(run_one),
        }
        self.backend.flush()?;

        if let Some(err) = fatal.into_inner().ok().flatten() {
            return Err(err);
        }
        let mut report = report.into_inner().unwrap_or_else(|p| p.into_inner());
        report.diagnostics.sort();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{CodeMetadata, Language, NoteMetadata, Symbol, Task, TaskStatus};

    fn note(path: &str, tags: &[&str], links: &[&str]) -> FileMetadata {
        FileMetadata::Note(NoteMetadata {
            path: path.to_string(),
            name: Path::new(path)
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            modified: 1,
            hash: String::new(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            links: links.iter().map(|s| s.to_string()).collect(),
            embeds: vec![],
            headings: [1, 0, 0, 0, 0, 0],
            tasks: vec![Task {
                text: "x".into(),
                line: 2,
                status: TaskStatus::Todo,
            }],
        })
    }

    #[test]
    fn test_project_for_uses_first_directory_below_root() {
        let roots = ProjectRoots::new(&[PathBuf::from("/work"), PathBuf::from("/work/clients")]);
        assert_eq!(
            roots.project_for("/work/alpha/src/main.rs"),
            Some("alpha".to_string())
        );
        assert_eq!(
            roots.project_for("/work/clients/acme/notes.md"),
            Some("acme".to_string())
        );
        assert_eq!(roots.project_for("/work/readme.md"), None);
        assert_eq!(roots.project_for("/elsewhere/x/y.md"), None);
    }

    #[test]
    fn test_note_sequence_order() {
        let ops = file_ops(&note("/v/a.md", &["t"], &["b"]), &ProjectRoots::default());
        assert!(matches!(ops[0], GraphOp::ClaimPlaceholder { .. }));
        assert!(matches!(ops[1], GraphOp::UpsertNote { .. }));
        assert!(matches!(ops[2], GraphOp::DropOwnedNodes { .. }));
        assert!(matches!(ops[3], GraphOp::DropOwnedEdges { .. }));
        assert!(matches!(ops[4], GraphOp::DropMembership { .. }));
        assert!(matches!(ops[5], GraphOp::Link { embed: false, .. }));
        assert!(matches!(ops[6], GraphOp::Tag { .. }));
        assert!(matches!(ops[7], GraphOp::AddTask { .. }));
        assert_eq!(ops.len(), 8);
    }

    #[test]
    fn test_code_sequence_defines_and_imports() {
        let meta = FileMetadata::Code(CodeMetadata {
            path: "/s/app.py".into(),
            name: "app.py".into(),
            language: Language::Python,
            modified: 0,
            hash: String::new(),
            functions: vec![Symbol {
                name: "run".into(),
                line: 3,
            }],
            classes: vec![Symbol {
                name: "App".into(),
                line: 1,
            }],
            imports: vec!["os".into()],
            tasks: vec![],
        });
        let ops = file_ops(&meta, &ProjectRoots::new(&[PathBuf::from("/")]));
        assert!(matches!(ops[0], GraphOp::UpsertCode { .. }));
        let defines = ops
            .iter()
            .filter(|op| matches!(op, GraphOp::Define { .. }))
            .count();
        assert_eq!(defines, 2);
        assert!(ops.iter().any(|op| matches!(op, GraphOp::Import { .. })));
        assert!(matches!(ops.last(), Some(GraphOp::Contain { project, .. }) if project == "s"));
    }

    #[test]
    fn test_delete_covers_both_labels() {
        let ops = delete_ops("/v/gone.md");
        assert_eq!(ops.len(), 4);
        assert!(ops.iter().all(|op| op.path() == "/v/gone.md"));
    }
}
