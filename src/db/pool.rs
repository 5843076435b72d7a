//! Bounded connection pool.
//!
//! Idle connections wait in a bounded channel. A checkout takes an idle
//! connection, opens a new one while under the limit, or blocks until one is
//! returned. Broken connections are dropped on return and free their slot.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::connection::{Connection, Timeouts};
use crate::error::{LibrarianError, Result};

pub struct Pool {
    address: String,
    timeouts: Timeouts,
    size: usize,
    open: AtomicUsize,
    idle_tx: Sender<Connection>,
    idle_rx: Receiver<Connection>,
}

impl Pool {
    pub fn new(address: impl Into<String>, timeouts: Timeouts, size: usize) -> Self {
        let size = size.max(1);
        let (idle_tx, idle_rx) = bounded(size);
        Self {
            address: address.into(),
            timeouts,
            size,
            open: AtomicUsize::new(0),
            idle_tx,
            idle_rx,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections currently open, idle or checked out.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn reserve_slot(&self) -> bool {
        self.open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.size).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn get(&self) -> Result<PooledConnection<'_>> {
        if let Ok(conn) = self.idle_rx.try_recv() {
            return Ok(PooledConnection::new(self, conn));
        }
        if self.reserve_slot() {
            return match Connection::open(&self.address, self.timeouts) {
                Ok(conn) => Ok(PooledConnection::new(self, conn)),
                Err(err) => {
                    self.open.fetch_sub(1, Ordering::SeqCst);
                    Err(err)
                }
            };
        }
        match self.idle_rx.recv_timeout(self.timeouts.io) {
            Ok(conn) => Ok(PooledConnection::new(self, conn)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Err(LibrarianError::connection(
                    &self.address,
                    format!("no connection available from pool of {}", self.size),
                ))
            }
        }
    }

    fn release(&self, conn: Connection) {
        if conn.is_broken() {
            tracing::debug!(address = %self.address, "discarding broken connection");
            self.open.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        if self.idle_tx.try_send(conn).is_err() {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// A checked-out connection, returned to the pool on drop.
pub struct PooledConnection<'a> {
    pool: &'a Pool,
    conn: Option<Connection>,
}

impl<'a> PooledConnection<'a> {
    fn new(pool: &'a Pool, conn: Connection) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in Drop.
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
