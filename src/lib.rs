//! Librarian: keeps a graph database in sync with a notes vault and codebases.
//!
//! Librarian walks configured source roots, classifies files into markdown
//! notes, code and assets, extracts metadata (tags, wikilinks, tasks,
//! definitions, imports) and mirrors it into a property graph.
//!
//! # Sync modes
//!
//! - **Direct**: every operation is sent to the graph server over RESP as it
//!   is produced, in parallel across files.
//! - **Dump**: operations are written as `GRAPH.QUERY` lines for replay
//!   through `redis-cli --pipe`. No connection is opened.
//!
//! Both modes produce the same per-file operation sequence, so re-syncing
//! unchanged content is a no-op on the graph.
//!
//! # Layout
//!
//! - [`scan`]: enumeration, classification and the two-pass full scan
//! - [`ingest`]: per-category metadata extraction
//! - [`graph`]: graph model, sync engine, queries, exports and reports
//! - [`db`]: RESP client and connection pool for direct mode
//! - [`indexer`] and [`watcher`]: incremental re-indexing for `watch`

pub mod analyze;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod error_codes;
pub mod graph;
pub mod indexer;
pub mod ingest;
pub mod logging;
pub mod output;
pub mod scan;
pub mod validation;
pub mod version;
pub mod watcher;

pub use config::LibrarianConfig;
pub use db::RemoteGraph;
pub use diagnostics::{DiagnosticStage, ScanDiagnostic, SkipReason};
pub use error::{LibrarianError, Result};
pub use graph::{
    collect_stats, DumpWriter, GraphBackend, GraphOp, GraphQuery, GraphStats, MemoryGraph,
    ProjectRoots, SyncEngine, SyncMode, SyncReport,
};
pub use indexer::{Indexer, IndexerStats, PathScheduler};
pub use ingest::{read_file, Category, FileMetadata, Language};
pub use output::{JsonResponse, OutputFormat};
pub use scan::{build_pool, full_scan, FileFilter, ScanOutput, ScanSummary};
pub use watcher::{FileSystemWatcher, WatcherBatch};
