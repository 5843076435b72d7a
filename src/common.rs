//! Helpers shared by the command modules.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};

use librarian::{DumpWriter, GraphBackend, LibrarianConfig, RemoteGraph, ScanDiagnostic, SyncMode};

pub fn load_config(explicit: Option<&Path>) -> Result<LibrarianConfig> {
    LibrarianConfig::load_effective(explicit).context("loading configuration")
}

/// Connect in direct mode with the pool sized to the worker count.
pub fn connect(config: &LibrarianConfig) -> Result<RemoteGraph> {
    RemoteGraph::connect(&config.database, config.effective_pool_size())
        .with_context(|| format!("connecting to graph database at {}", config.database.address))
}

/// Where a sync sends its operations.
pub enum SyncTarget {
    Remote(RemoteGraph),
    Dump { writer: DumpWriter, path: PathBuf },
}

impl SyncTarget {
    /// Dump when a file is given, otherwise connect.
    pub fn open(config: &LibrarianConfig, dump: Option<&Path>) -> Result<Self> {
        match dump {
            Some(path) => {
                let writer = DumpWriter::create(path, &config.database.graph, config.database.batch_size)
                    .with_context(|| format!("opening dump file {}", path.display()))?;
                Ok(SyncTarget::Dump {
                    writer,
                    path: path.to_path_buf(),
                })
            }
            None => Ok(SyncTarget::Remote(connect(config)?)),
        }
    }

    pub fn backend(&self) -> &dyn GraphBackend {
        match self {
            SyncTarget::Remote(remote) => remote,
            SyncTarget::Dump { writer, .. } => writer,
        }
    }

    pub fn mode(&self) -> SyncMode {
        match self {
            SyncTarget::Remote(_) => SyncMode::Direct,
            SyncTarget::Dump { .. } => SyncMode::Dump,
        }
    }

    /// Commands written, in dump mode.
    pub fn commands_written(&self) -> Option<u64> {
        match self {
            SyncTarget::Remote(_) => None,
            SyncTarget::Dump { writer, .. } => Some(writer.commands_written()),
        }
    }

    /// True when the dump stream is stdout, so reports must go to stderr.
    pub fn dumps_to_stdout(&self) -> bool {
        matches!(self, SyncTarget::Dump { path, .. } if path.as_os_str() == "-")
    }
}

/// Progress bar on stderr. Hidden bars accept updates and draw nothing.
pub fn progress_bar(message: &str, hidden: bool) -> ProgressBar {
    let pb = ProgressBar::new(0);
    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Warnings and errors from a run, one per line on stderr.
pub fn print_diagnostics<'a>(diagnostics: impl Iterator<Item = &'a ScanDiagnostic>) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic.format_line());
    }
}
