//! Incremental indexing for `watch`.
//!
//! A single coordinating loop receives debounced batches and dispatches one
//! reconcile task per path onto the worker pool. Reconcile reads the path's
//! current state: an existing indexable file is re-synced, a missing one is
//! deleted from the graph. A directory fans out into one task per file below
//! it, on disk if it exists or in the hash cache if it vanished. Tasks for the
//! same path never overlap; an event that arrives while its path is in flight
//! schedules exactly one follow-up run.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::LibrarianConfig;
use crate::diagnostics::SkipReason;
use crate::error::{LibrarianError, Result};
use crate::graph::{GraphBackend, ProjectRoots, SyncEngine, SyncMode};
use crate::ingest::{read_file, Category};
use crate::scan::{full_scan, project_roots, walk_files, FileFilter, ScanContext, ScanSummary};
use crate::watcher::WatcherBatch;

/// How long the loop waits for a batch before checking shutdown and rescans.
const TICK: Duration = Duration::from_millis(200);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serializes work per path and coalesces repeated events.
#[derive(Debug, Default)]
pub struct PathScheduler {
    state: Mutex<SchedulerState>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    in_flight: HashSet<PathBuf>,
    pending: HashSet<PathBuf>,
}

impl PathScheduler {
    /// Register an event. Returns true if the caller should start a task.
    pub fn submit(&self, path: &Path) -> bool {
        let mut state = lock(&self.state);
        if state.in_flight.contains(path) {
            state.pending.insert(path.to_path_buf());
            false
        } else {
            state.in_flight.insert(path.to_path_buf());
            true
        }
    }

    /// Mark a run finished. Returns true if the task must run again.
    pub fn complete(&self, path: &Path) -> bool {
        let mut state = lock(&self.state);
        if state.pending.remove(path) {
            true
        } else {
            state.in_flight.remove(path);
            false
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight.len()
    }
}

/// Result of reconciling one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Indexed,
    /// Content hash equals the last synced hash
    Unchanged,
    Deleted,
    Skipped,
    Failed,
    /// A directory whose files were scheduled individually
    Expanded,
}

/// Counters over the life of the indexer.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IndexerStats {
    pub indexed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub directories: usize,
}

#[derive(Debug, Default)]
struct Counters {
    indexed: AtomicUsize,
    unchanged: AtomicUsize,
    deleted: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    directories: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Indexed => &self.indexed,
            Outcome::Unchanged => &self.unchanged,
            Outcome::Deleted => &self.deleted,
            Outcome::Skipped => &self.skipped,
            Outcome::Failed => &self.failed,
            Outcome::Expanded => &self.directories,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> IndexerStats {
        IndexerStats {
            indexed: self.indexed.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            directories: self.directories.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    config: LibrarianConfig,
    filter: FileFilter,
    backend: Arc<dyn GraphBackend>,
    pool: Arc<rayon::ThreadPool>,
    projects: ProjectRoots,
    /// Path -> content hash of the last successful sync
    hashes: Mutex<HashMap<String, String>>,
    scheduler: PathScheduler,
    counters: Counters,
    fatal: Mutex<Option<LibrarianError>>,
    active: Mutex<usize>,
    idle: Condvar,
}

impl Shared {
    fn engine(&self) -> SyncEngine<'_> {
        SyncEngine::new(self.backend.as_ref(), self.projects.clone(), SyncMode::Direct)
    }

    fn last_hash(&self, path: &str) -> Option<String> {
        lock(&self.hashes).get(path).cloned()
    }

    fn fail(&self, path: &str, err: LibrarianError) -> Outcome {
        if let LibrarianError::Connection { .. } = err {
            tracing::error!(path, error = %err, "lost connection to graph database");
            lock(&self.fatal).get_or_insert(err);
        } else {
            tracing::warn!(path, error = %err, "re-index failed");
        }
        Outcome::Failed
    }

    fn delete(&self, path: &str) -> Outcome {
        match self.engine().delete_file(path) {
            Ok(_) => {
                lock(&self.hashes).remove(path);
                tracing::info!(path, "deleted");
                Outcome::Deleted
            }
            Err(err) => self.fail(path, err),
        }
    }

    /// Bring the graph in line with the current state of `path`.
    fn reconcile(self: &Arc<Self>, path: &Path) -> Outcome {
        let key = path.to_string_lossy().into_owned();

        let metadata = match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(_) => return self.vanished(path, &key),
        };
        if metadata.is_dir() {
            return self.expand_dir(path);
        }
        if !metadata.is_file() {
            return Outcome::Skipped;
        }

        let category = match self.filter.classify(path) {
            Ok(Category::Asset) => return Outcome::Skipped,
            Ok(category) => category,
            Err(reason) => return self.not_indexable(&key, reason),
        };
        if let Err(reason) = self.filter.check_size(metadata.len()) {
            tracing::warn!(path = %key, reason = %reason, "skipping file");
            return self.not_indexable(&key, reason);
        }

        let meta = match read_file(path, category) {
            Ok(Some(meta)) => meta,
            Ok(None) => return Outcome::Skipped,
            Err(err) => return self.fail(&key, err),
        };
        if self.last_hash(&key).as_deref() == Some(meta.hash()) {
            tracing::debug!(path = %key, "content unchanged");
            return Outcome::Unchanged;
        }
        match self.engine().sync_file(&meta) {
            Ok(ops) => {
                lock(&self.hashes).insert(key.clone(), meta.hash().to_string());
                tracing::info!(path = %key, ops, "indexed");
                Outcome::Indexed
            }
            Err(err) => self.fail(&key, err),
        }
    }

    /// `path` no longer exists. Every synced file under it is scheduled for
    /// deletion, which covers a directory moved or removed in one event.
    fn vanished(self: &Arc<Self>, path: &Path, key: &str) -> Outcome {
        let (mut below, was_synced) = {
            let hashes = lock(&self.hashes);
            let below: Vec<PathBuf> = hashes
                .keys()
                .map(PathBuf::from)
                .filter(|synced| synced.as_path() != path && synced.starts_with(path))
                .collect();
            (below, hashes.contains_key(key))
        };
        let had_files = !below.is_empty();
        if had_files {
            below.sort();
            tracing::debug!(path = key, files = below.len(), "directory gone");
            for file in below {
                dispatch(self, file);
            }
        }

        match self.filter.classify(path) {
            Ok(Category::Markdown) | Ok(Category::Code) => self.delete(key),
            _ if was_synced => self.delete(key),
            _ if had_files => Outcome::Expanded,
            _ => Outcome::Skipped,
        }
    }

    /// Schedule every indexable file below an existing directory, pruned the
    /// same way as a full scan.
    fn expand_dir(self: &Arc<Self>, dir: &Path) -> Outcome {
        if self.filter.is_ignored_dir(dir) {
            return Outcome::Skipped;
        }
        let mut files = 0usize;
        for entry in walk_files(&self.filter, dir) {
            match entry {
                Ok(entry) => {
                    files += 1;
                    dispatch(self, entry.into_path());
                }
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "walk failed");
                }
            }
        }
        tracing::debug!(dir = %dir.display(), files, "directory event expanded");
        Outcome::Expanded
    }

    /// A file that stopped qualifying is removed if it was indexed before.
    fn not_indexable(&self, key: &str, reason: SkipReason) -> Outcome {
        if lock(&self.hashes).contains_key(key) {
            tracing::debug!(path = key, reason = %reason, "no longer indexable");
            return self.delete(key);
        }
        Outcome::Skipped
    }
}

/// Start a reconcile task for `path` unless one is already in flight.
fn dispatch(shared: &Arc<Shared>, path: PathBuf) {
    if !shared.scheduler.submit(&path) {
        tracing::trace!(path = %path.display(), "coalesced with in-flight run");
        return;
    }
    *lock(&shared.active) += 1;
    let task = Arc::clone(shared);
    shared.pool.spawn(move || {
        loop {
            let outcome = task.reconcile(&path);
            task.counters.record(outcome);
            if !task.scheduler.complete(&path) {
                break;
            }
        }
        let mut active = lock(&task.active);
        *active -= 1;
        if *active == 0 {
            task.idle.notify_all();
        }
    });
}

/// Watch-mode indexer over a shared backend and worker pool.
pub struct Indexer {
    shared: Arc<Shared>,
}

impl Indexer {
    pub fn new(
        config: &LibrarianConfig,
        backend: Arc<dyn GraphBackend>,
        pool: Arc<rayon::ThreadPool>,
    ) -> Result<Self> {
        let shared = Shared {
            config: config.clone(),
            filter: FileFilter::new(config)?,
            backend,
            pool,
            projects: project_roots(config),
            hashes: Mutex::new(HashMap::new()),
            scheduler: PathScheduler::default(),
            counters: Counters::default(),
            fatal: Mutex::new(None),
            active: Mutex::new(0),
            idle: Condvar::new(),
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn stats(&self) -> IndexerStats {
        self.shared.counters.snapshot()
    }

    /// Full scan and sync of every root, seeding the hash cache.
    pub fn initial_scan(&self) -> Result<ScanSummary> {
        let ctx = ScanContext::new(&self.shared.config)?;
        let roots = ctx.configured_roots();
        let engine = self.shared.engine();
        let output = full_scan(&self.shared.config, &roots, Some(&engine), &self.shared.pool, None)?;

        let failed: HashSet<&str> = output
            .summary
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.path())
            .collect();
        let mut hashes = lock(&self.shared.hashes);
        for record in &output.records {
            if !failed.contains(record.path()) {
                hashes.insert(record.path().to_string(), record.hash().to_string());
            }
        }
        drop(hashes);
        Ok(output.summary)
    }

    /// Dispatch one reconcile task per path in the batch.
    pub fn handle_batch(&self, batch: &WatcherBatch) {
        for path in &batch.paths {
            dispatch(&self.shared, path.clone());
        }
    }

    /// Block until every dispatched task has finished.
    pub fn wait_idle(&self) {
        let mut active = lock(&self.shared.active);
        while *active > 0 {
            active = self
                .shared
                .idle
                .wait(active)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Reconcile every file on disk plus every path synced before.
    ///
    /// Catches events the watcher missed, including deletions.
    pub fn rescan(&self) -> Result<()> {
        let ctx = ScanContext::new(&self.shared.config)?;
        let roots = ctx.configured_roots();
        let mut paths: HashSet<PathBuf> = ctx
            .enumerate(&roots)
            .into_iter()
            .map(|candidate| candidate.path)
            .collect();
        paths.extend(lock(&self.shared.hashes).keys().map(PathBuf::from));

        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort();
        tracing::info!(paths = paths.len(), "periodic rescan");
        for path in paths {
            dispatch(&self.shared, path);
        }
        Ok(())
    }

    fn take_fatal(&self) -> Option<LibrarianError> {
        lock(&self.shared.fatal).take()
    }

    /// Run until shutdown is requested or the batch channel disconnects.
    ///
    /// Without a receiver only periodic rescans run. In-flight tasks always
    /// finish before returning. A connection failure ends the loop with an
    /// error.
    pub fn run(&self, batches: Option<&Receiver<WatcherBatch>>, shutdown: &AtomicBool) -> Result<IndexerStats> {
        let interval = self
            .shared
            .config
            .watcher
            .rescan_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let mut next_rescan = interval.map(|i| Instant::now() + i);

        while !shutdown.load(Ordering::SeqCst) {
            if let Some(err) = self.take_fatal() {
                self.wait_idle();
                return Err(err);
            }

            match batches {
                Some(rx) => match rx.recv_timeout(TICK) {
                    Ok(batch) => self.handle_batch(&batch),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        tracing::warn!("watcher channel closed");
                        break;
                    }
                },
                None => std::thread::sleep(TICK),
            }

            if let (Some(due), Some(interval)) = (next_rescan, interval) {
                if Instant::now() >= due {
                    self.rescan()?;
                    next_rescan = Some(Instant::now() + interval);
                }
            }
        }

        tracing::info!(in_flight = self.shared.scheduler.in_flight(), "waiting for in-flight tasks");
        self.wait_idle();
        if let Some(err) = self.take_fatal() {
            return Err(err);
        }
        Ok(self.stats())
    }
}
