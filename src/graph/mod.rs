//! Graph model, write operations and read queries.
//!
//! Everything that talks to the graph goes through [`GraphBackend`]. The
//! remote database ([`crate::db::RemoteGraph`]), the dump stream
//! ([`dump::DumpWriter`]) and the in-process [`memory::MemoryGraph`] all
//! implement it, so the sync engine does not know which one it drives.

pub mod count;
pub mod dump;
pub mod export;
pub mod memory;
pub mod ops;
pub mod query;
pub mod report;
pub mod schema;
pub mod sync;

pub use count::{collect_stats, GraphStats};
pub use dump::DumpWriter;
pub use memory::MemoryGraph;
pub use ops::GraphOp;
pub use query::{GraphQuery, Location, NoteRef, Row, Value};
pub use schema::{DefinitionKind, EdgeType, FileLabel, NodeLabel};
pub use sync::{ProjectRoots, SyncEngine, SyncMode, SyncReport};

use crate::error::Result;

/// A store that accepts graph operations and answers queries.
pub trait GraphBackend: Send + Sync {
    /// Apply one write operation.
    fn execute(&self, op: &GraphOp) -> Result<()>;

    /// Run a read query and return its rows.
    fn query(&self, query: &GraphQuery) -> Result<Vec<Row>>;

    /// Push buffered writes to their destination.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: GraphBackend + ?Sized> GraphBackend for std::sync::Arc<T> {
    fn execute(&self, op: &GraphOp) -> Result<()> {
        (**self).execute(op)
    }

    fn query(&self, query: &GraphQuery) -> Result<Vec<Row>> {
        (**self).query(query)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}
