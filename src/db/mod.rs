//! Direct-mode graph backend over RESP.
//!
//! Each [`GraphOp`] is sent immediately as `GRAPH.QUERY <graph> <cypher>` on a
//! pooled connection. Queries use the same path and parse the tabular reply.

pub mod connection;
pub mod pool;
pub mod resp;

pub use connection::{Connection, Timeouts};
pub use pool::Pool;

use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::graph::{GraphBackend, GraphOp, GraphQuery, Row};

pub struct RemoteGraph {
    graph: String,
    pool: Pool,
}

impl RemoteGraph {
    /// Open the pool and verify the server answers PING.
    pub fn connect(config: &DatabaseConfig, pool_size: usize) -> Result<Self> {
        let timeouts = Timeouts {
            connect: Duration::from_millis(config.connect_timeout_ms),
            io: Duration::from_millis(config.io_timeout_ms),
        };
        let pool = Pool::new(config.address.clone(), timeouts, pool_size);
        pool.get()?.ping()?;
        tracing::info!(
            address = %config.address,
            graph = %config.graph,
            pool = pool.size(),
            "connected to graph database"
        );
        Ok(Self {
            graph: config.graph.clone(),
            pool,
        })
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    fn run(&self, cypher: &str) -> Result<Vec<Row>> {
        let mut conn = self.pool.get()?;
        conn.graph_query(&self.graph, cypher)
    }
}

impl GraphBackend for RemoteGraph {
    fn execute(&self, op: &GraphOp) -> Result<()> {
        let cypher = op.to_cypher();
        tracing::trace!(%cypher, "execute");
        self.run(&cypher).map(|_| ())
    }

    fn query(&self, query: &GraphQuery) -> Result<Vec<Row>> {
        let cypher = query.to_cypher();
        tracing::trace!(%cypher, "query");
        self.run(&cypher)
    }
}
