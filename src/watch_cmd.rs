//! Watch command implementation

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use librarian::output::emit_json;
use librarian::scan::ScanContext;
use librarian::{build_pool, FileSystemWatcher, GraphBackend, Indexer, LibrarianError, OutputFormat};

use crate::common::{connect, load_config, print_diagnostics};

/// Set `shutdown` on SIGINT or SIGTERM.
fn install_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::signal;
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([signal::SIGTERM, signal::SIGINT])
            .context("registering signal handlers")?;

        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                tracing::info!(signal = sig, "shutdown requested");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }
    #[cfg(not(unix))]
    let _ = shutdown;
    Ok(())
}

pub fn run_watch(config_path: Option<&Path>, output: OutputFormat, no_initial_scan: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let roots = ScanContext::new(&config)?.configured_roots();
    if roots.is_empty() {
        bail!(LibrarianError::config("none of the configured source roots exist"));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(shutdown.clone())?;

    let backend: Arc<dyn GraphBackend> = Arc::new(connect(&config)?);
    let pool = Arc::new(build_pool(config.worker_count())?);
    let indexer = Indexer::new(&config, backend, pool)?;

    // Subscribe before the baseline scan so edits made during it queue up.
    let watcher = if config.watcher.realtime {
        Some(FileSystemWatcher::new(&roots, Duration::from_millis(config.watcher.debounce_ms))?)
    } else {
        tracing::info!("realtime watching disabled; periodic rescans only");
        None
    };

    if !no_initial_scan {
        tracing::info!(roots = roots.len(), "baseline scan");
        let summary = indexer.initial_scan().context("baseline scan aborted")?;
        if !output.is_json() {
            println!(
                "baseline: scanned {}  succeeded {}  failed {}  skipped {}",
                summary.scanned, summary.succeeded, summary.failed, summary.skipped
            );
            print_diagnostics(summary.warnings());
        }
    }

    if watcher.is_some() && !output.is_json() {
        for root in &roots {
            println!("watching {}", root.display());
        }
    }
    let stats = indexer
        .run(watcher.as_ref().map(FileSystemWatcher::receiver), &shutdown)
        .context("watch stopped")?;

    if output.is_json() {
        return emit_json("watch", stats);
    }
    println!(
        "indexed: {}  unchanged: {}  deleted: {}  skipped: {}  failed: {}  directories: {}",
        stats.indexed, stats.unchanged, stats.deleted, stats.skipped, stats.failed, stats.directories
    );
    Ok(())
}
