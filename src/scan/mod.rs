//! Full scans: enumerate roots, classify, parse in parallel, sync.
//!
//! A scan is two passes. The parse pass fills an in-memory metadata set using
//! the worker pool; the sync pass hands that set to the [`SyncEngine`]. All
//! run-scoped state lives in a [`ScanContext`].

pub mod filter;

pub use filter::FileFilter;

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::LibrarianConfig;
use crate::diagnostics::{DiagnosticStage, ScanDiagnostic, SkipReason};
use crate::error::{LibrarianError, Result};
use crate::graph::{ProjectRoots, SyncEngine, SyncReport};
use crate::ingest::{read_file, Category, FileMetadata};
use crate::validation::canonicalize_root;

/// Progress callback: (completed, total).
pub type ScanProgress = dyn Fn(usize, usize) + Send + Sync;

/// A file that passed classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub category: Category,
}

/// End-of-run counters and diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Files classified into a category
    pub scanned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Classified as assets; counted in `scanned` only
    pub assets: usize,
    pub operations: usize,
    pub diagnostics: Vec<ScanDiagnostic>,
}

impl ScanSummary {
    pub fn warnings(&self) -> impl Iterator<Item = &ScanDiagnostic> {
        self.diagnostics.iter().filter(|d| match d {
            ScanDiagnostic::Skipped { reason, .. } => reason.is_warning(),
            ScanDiagnostic::Error { .. } => true,
        })
    }
}

#[derive(Debug, Default)]
struct Counters {
    scanned: AtomicUsize,
    parsed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    assets: AtomicUsize,
}

/// Regular files below `root` in file-name order.
///
/// Symlinks are not followed and globally ignored directories are pruned
/// without being entered.
pub fn walk_files<'f>(
    filter: &'f FileFilter,
    root: &Path,
) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> + 'f {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| {
            !(e.depth() > 0 && e.file_type().is_dir() && filter.is_ignored_dir(e.path()))
        })
        .filter(|entry| entry.as_ref().map_or(true, |e| e.file_type().is_file()))
}

/// Configuration plus run-scoped counters for one scan.
pub struct ScanContext<'a> {
    config: &'a LibrarianConfig,
    filter: FileFilter,
    counters: Counters,
    diagnostics: std::sync::Mutex<Vec<ScanDiagnostic>>,
}

impl<'a> ScanContext<'a> {
    pub fn new(config: &'a LibrarianConfig) -> Result<Self> {
        Ok(Self {
            config,
            filter: FileFilter::new(config)?,
            counters: Counters::default(),
            diagnostics: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    fn record(&self, diagnostic: ScanDiagnostic) {
        match self.diagnostics.lock() {
            Ok(mut d) => d.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }

    fn skip(&self, path: &Path, reason: SkipReason) {
        if reason.is_warning() {
            tracing::warn!(path = %path.display(), reason = %reason, "skipping file");
        } else {
            tracing::trace!(path = %path.display(), reason = %reason, "skipping file");
        }
        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        self.record(ScanDiagnostic::skipped(path.to_string_lossy(), reason));
    }

    /// Canonical enabled roots in priority order. Missing roots are skipped
    /// with a warning.
    pub fn configured_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for root in self.config.enabled_roots() {
            match canonicalize_root(&root.path) {
                Ok(path) => roots.push(path),
                Err(e) => {
                    tracing::warn!(root = %root.name, error = %e, "source root unavailable");
                    self.skip(&root.path, SkipReason::Unreadable);
                }
            }
        }
        roots
    }

    /// Classify one path found on disk, including the size check.
    pub fn classify_file(&self, path: &Path) -> Option<Category> {
        let category = match self.filter.classify(path) {
            Ok(c) => c,
            Err(reason) => {
                self.skip(path, reason);
                return None;
            }
        };
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                self.skip(path, SkipReason::Unreadable);
                return None;
            }
        };
        if let Err(reason) = self.filter.check_size(size) {
            self.skip(path, reason);
            return None;
        }
        self.counters.scanned.fetch_add(1, Ordering::Relaxed);
        if category == Category::Asset {
            self.counters.assets.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Some(category)
    }

    /// Walk the roots and return classified files in sorted order.
    ///
    /// Symlinks are not followed. A path reachable from several roots is
    /// kept once, under the first root in priority order.
    pub fn enumerate(&self, roots: &[PathBuf]) -> Vec<Candidate> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut candidates = Vec::new();

        for root in roots {
            for entry in walk_files(&self.filter, root) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        let path = err
                            .path()
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| root.clone());
                        self.skip(&path, SkipReason::Unreadable);
                        continue;
                    }
                };
                let path = entry.into_path();
                if !seen.insert(path.clone()) {
                    continue;
                }
                if let Some(category) = self.classify_file(&path) {
                    candidates.push(Candidate { path, category });
                }
            }
        }

        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        candidates
    }

    /// Parse candidates on the pool. Failures are counted and recorded.
    pub fn parse_all(
        &self,
        candidates: &[Candidate],
        pool: &rayon::ThreadPool,
        progress: Option<&ScanProgress>,
    ) -> Vec<FileMetadata> {
        let total = candidates.len();
        let done = AtomicUsize::new(0);

        // Per-worker buffers, merged once at the end.
        let (mut records, failures) = pool.install(|| {
            candidates
                .par_iter()
                .fold(
                    || (Vec::new(), Vec::new()),
                    |(mut ok, mut failed), candidate| {
                        match read_file(&candidate.path, candidate.category) {
                            Ok(Some(meta)) => ok.push(meta),
                            Ok(None) => {}
                            Err(err) => failed.push(parse_failure(&candidate.path, &err)),
                        }
                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        if let Some(cb) = progress {
                            cb(n, total);
                        }
                        (ok, failed)
                    },
                )
                .reduce(
                    || (Vec::new(), Vec::new()),
                    |(mut a_ok, mut a_failed), (b_ok, b_failed)| {
                        a_ok.extend(b_ok);
                        a_failed.extend(b_failed);
                        (a_ok, a_failed)
                    },
                )
        });

        self.counters.parsed.fetch_add(records.len(), Ordering::Relaxed);
        self.counters.failed.fetch_add(failures.len(), Ordering::Relaxed);
        for failure in failures {
            self.record(failure);
        }
        records.sort_by(|a, b| a.path().cmp(b.path()));
        records
    }

    /// Counters so far, folding in a sync report when one exists.
    pub fn summary(&self, sync: Option<&SyncReport>) -> ScanSummary {
        let mut diagnostics = match self.diagnostics.lock() {
            Ok(d) => d.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let parsed = self.counters.parsed.load(Ordering::Relaxed);
        let mut failed = self.counters.failed.load(Ordering::Relaxed);
        let mut succeeded = parsed;
        let mut operations = 0;
        if let Some(report) = sync {
            succeeded = report.succeeded;
            failed += report.failed;
            operations = report.operations;
            diagnostics.extend(report.diagnostics.iter().cloned());
        }
        diagnostics.sort();
        ScanSummary {
            scanned: self.counters.scanned.load(Ordering::Relaxed),
            succeeded,
            failed,
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            assets: self.counters.assets.load(Ordering::Relaxed),
            operations,
            diagnostics,
        }
    }
}

fn parse_failure(path: &Path, err: &LibrarianError) -> ScanDiagnostic {
    let stage = match err {
        LibrarianError::Parse { .. } => DiagnosticStage::Parse,
        _ => DiagnosticStage::Read,
    };
    tracing::warn!(path = %path.display(), error = %err, "failed to parse file");
    ScanDiagnostic::error(path.to_string_lossy(), stage, err.to_string())
}

/// Build the shared worker pool.
pub fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("librarian-worker-{}", i))
        .build()
        .map_err(|e| LibrarianError::config(format!("cannot start worker pool: {}", e)))
}

/// Project-root prefixes in the same canonical form as scanned paths.
pub fn project_roots(config: &LibrarianConfig) -> ProjectRoots {
    let roots: Vec<PathBuf> = config
        .projects
        .roots
        .iter()
        .map(|root| canonicalize_root(root).unwrap_or_else(|_| root.clone()))
        .collect();
    ProjectRoots::new(&roots)
}

/// Output of [`full_scan`].
pub struct ScanOutput {
    pub records: Vec<FileMetadata>,
    pub summary: ScanSummary,
}

/// Enumerate, parse and (when an engine is given) sync every file under
/// `roots`.
pub fn full_scan(
    config: &LibrarianConfig,
    roots: &[PathBuf],
    engine: Option<&SyncEngine<'_>>,
    pool: &rayon::ThreadPool,
    progress: Option<&ScanProgress>,
) -> Result<ScanOutput> {
    let ctx = ScanContext::new(config)?;
    let candidates = ctx.enumerate(roots);
    tracing::info!(files = candidates.len(), roots = roots.len(), "enumerated sources");

    let records = ctx.parse_all(&candidates, pool, progress);
    let report = match engine {
        Some(engine) => Some(engine.sync_all(&records, Some(pool), None)?),
        None => None,
    };
    let summary = ctx.summary(report.as_ref());
    tracing::info!(
        scanned = summary.scanned,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        "scan finished"
    );
    Ok(ScanOutput { records, summary })
}
