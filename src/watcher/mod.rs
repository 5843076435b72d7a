//! Filesystem watcher with debounced batch events.
//!
//! All events within a debounce window are collected, de-duplicated and
//! sorted into one [`WatcherBatch`]. Batches carry paths only: the indexer
//! checks the filesystem to decide between re-index and delete, so event kinds
//! are not needed.

use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LibrarianError, Result};

/// Deterministic batch of dirty file paths, sorted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatcherBatch {
    pub paths: Vec<PathBuf>,
}

impl WatcherBatch {
    fn from_set(paths: BTreeSet<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Watches every root recursively and emits batches on a channel.
///
/// Dropping the watcher stops notification delivery and disconnects the
/// channel.
pub struct FileSystemWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    batches: Receiver<WatcherBatch>,
}

impl FileSystemWatcher {
    pub fn new(roots: &[PathBuf], debounce: Duration) -> Result<Self> {
        let (tx, rx) = unbounded();
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            forward(result, &tx)
        })
        .map_err(|e| watch_error(Path::new("."), e))?;

        for root in roots {
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| watch_error(root, e))?;
            tracing::info!(root = %root.display(), "watching");
        }

        Ok(Self {
            _debouncer: debouncer,
            batches: rx,
        })
    }

    pub fn receiver(&self) -> &Receiver<WatcherBatch> {
        &self.batches
    }
}

fn watch_error(path: &Path, err: notify::Error) -> LibrarianError {
    LibrarianError::filesystem(path, std::io::Error::other(err.to_string()))
}

fn forward(result: DebounceEventResult, tx: &Sender<WatcherBatch>) {
    match result {
        Ok(events) => {
            let dirty = extract_dirty_paths(&events);
            if !dirty.is_empty() && tx.send(WatcherBatch::from_set(dirty)).is_err() {
                tracing::debug!("batch dropped, indexer no longer listening");
            }
        }
        Err(error) => {
            tracing::warn!(error = %error, "watcher error");
        }
    }
}

/// Collect dirty paths from one debounced window, one entry per path.
///
/// Directories are kept: a directory moved into or out of a root produces a
/// single event for the directory itself, and the indexer expands it.
fn extract_dirty_paths(events: &[DebouncedEvent]) -> BTreeSet<PathBuf> {
    events.iter().map(|event| event.path.clone()).collect()
}
