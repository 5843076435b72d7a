//! A single blocking connection to the graph server.

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::resp::{encode_command, read_value, RespValue};
use crate::error::{LibrarianError, Result};
use crate::graph::{Row, Value};

/// Timeouts applied to every connection.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub io: Duration,
}

pub struct Connection {
    address: String,
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    broken: bool,
}

impl Connection {
    pub fn open(address: &str, timeouts: Timeouts) -> Result<Self> {
        let addrs = address
            .to_socket_addrs()
            .map_err(|e| LibrarianError::connection(address, format!("resolve: {}", e)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeouts.connect) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(timeouts.io))
                        .map_err(|e| LibrarianError::connection(address, e))?;
                    stream
                        .set_write_timeout(Some(timeouts.io))
                        .map_err(|e| LibrarianError::connection(address, e))?;
                    stream.set_nodelay(true).ok();
                    let reader = stream
                        .try_clone()
                        .map_err(|e| LibrarianError::connection(address, e))?;
                    tracing::debug!(address, "connected");
                    return Ok(Self {
                        address: address.to_string(),
                        writer: stream,
                        reader: BufReader::new(reader),
                        broken: false,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(LibrarianError::connection(
            address,
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses resolved".to_string()),
        ))
    }

    /// Whether an I/O or protocol failure left the stream unusable.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Send one command and read its reply.
    pub fn command(&mut self, args: &[&[u8]]) -> Result<RespValue> {
        let result = self.round_trip(args);
        if let Err(err) = &result {
            if err.is_connection_fatal() {
                self.broken = true;
            }
        }
        result
    }

    fn round_trip(&mut self, args: &[&[u8]]) -> Result<RespValue> {
        let request = encode_command(args);
        self.writer
            .write_all(&request)
            .map_err(|e| LibrarianError::connection(&self.address, e))?;
        match read_value(&mut self.reader) {
            Ok(value) => Ok(value),
            Err(LibrarianError::Io(e)) => Err(LibrarianError::connection(&self.address, e)),
            Err(other) => Err(other),
        }
    }

    pub fn ping(&mut self) -> Result<()> {
        match self.command(&[b"PING".as_slice()])? {
            RespValue::Simple(s) if s == "PONG" => Ok(()),
            RespValue::Error(e) => Err(LibrarianError::Query(e)),
            other => {
                self.broken = true;
                Err(LibrarianError::Protocol(format!(
                    "unexpected PING reply: {:?}",
                    other
                )))
            }
        }
    }

    /// Run a graph query and return its result rows.
    ///
    /// Write-only queries reply with statistics only and yield no rows.
    pub fn graph_query(&mut self, graph: &str, cypher: &str) -> Result<Vec<Row>> {
        let reply = self.command(&[b"GRAPH.QUERY".as_slice(), graph.as_bytes(), cypher.as_bytes()])?;
        match parse_query_reply(reply) {
            Err(err @ LibrarianError::Protocol(_)) => {
                self.broken = true;
                Err(err)
            }
            other => other,
        }
    }
}

/// Tabular reply: `[header, rows, stats]`, or `[stats]` for writes.
pub fn parse_query_reply(reply: RespValue) -> Result<Vec<Row>> {
    let parts = match reply {
        RespValue::Error(message) => return Err(LibrarianError::Query(message)),
        RespValue::Array(Some(parts)) => parts,
        other => {
            return Err(LibrarianError::Protocol(format!(
                "expected array reply, got {:?}",
                other
            )))
        }
    };
    match parts.len() {
        1 => Ok(Vec::new()),
        3 => {
            let mut parts = parts.into_iter();
            let _header = parts.next();
            let rows = parts
                .next()
                .and_then(RespValue::into_array)
                .ok_or_else(|| LibrarianError::Protocol("result set is not an array".into()))?;
            rows.into_iter()
                .map(|row| {
                    row.into_array()
                        .map(|cells| cells.into_iter().map(cell_value).collect())
                        .ok_or_else(|| LibrarianError::Protocol("result row is not an array".into()))
                })
                .collect()
        }
        n => Err(LibrarianError::Protocol(format!(
            "query reply has {} sections",
            n
        ))),
    }
}

fn cell_value(cell: RespValue) -> Value {
    match cell {
        RespValue::Integer(i) => Value::Int(i),
        RespValue::Simple(s) => Value::Str(s),
        RespValue::Bulk(Some(bytes)) => Value::Str(String::from_utf8_lossy(&bytes).into_owned()),
        RespValue::Bulk(None) | RespValue::Array(None) => Value::Null,
        RespValue::Error(e) => Value::Str(e),
        RespValue::Array(Some(items)) => {
            let parts: Vec<String> = items
                .iter()
                .map(|i| i.as_text().unwrap_or_default())
                .collect();
            Value::Str(parts.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespValue {
        RespValue::Bulk(Some(s.as_bytes().to_vec()))
    }

    #[test]
    fn test_write_reply_has_no_rows() {
        let reply = RespValue::Array(Some(vec![RespValue::Array(Some(vec![bulk(
            "Nodes created: 1",
        )]))]));
        assert!(parse_query_reply(reply).unwrap().is_empty());
    }

    #[test]
    fn test_tabular_reply() {
        let reply = RespValue::Array(Some(vec![
            RespValue::Array(Some(vec![bulk("n.path"), bulk("n.line")])),
            RespValue::Array(Some(vec![RespValue::Array(Some(vec![
                bulk("/s/app.js"),
                RespValue::Integer(4),
            ]))])),
            RespValue::Array(Some(vec![bulk("Query internal execution time: 0.1")])),
        ]));
        let rows = parse_query_reply(reply).unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::Str("/s/app.js".into()), Value::Int(4)]]
        );
    }

    #[test]
    fn test_error_reply_is_query_error() {
        let err = parse_query_reply(RespValue::Error("ERR syntax".into())).unwrap_err();
        assert!(matches!(err, LibrarianError::Query(_)));
        assert!(!err.is_connection_fatal());
    }

    #[test]
    fn test_null_cells() {
        assert_eq!(cell_value(RespValue::Bulk(None)), Value::Null);
    }

    #[test]
    fn test_unreachable_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let err = Connection::open(
            &addr,
            Timeouts {
                connect: Duration::from_millis(200),
                io: Duration::from_millis(200),
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, LibrarianError::Connection { .. }));
    }
}
