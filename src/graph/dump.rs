//! Dump-mode backend: graph operations as bulk-load commands.
//!
//! Each op becomes one line, `GRAPH.QUERY <graph> "<cypher>"`, in the inline
//! command syntax accepted by `redis-cli --pipe`. The stream is flushed every
//! `batch_size` commands and again on [`GraphBackend::flush`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use super::ops::GraphOp;
use super::query::{GraphQuery, Row};
use super::GraphBackend;
use crate::error::{LibrarianError, Result};

struct Inner {
    out: Box<dyn Write + Send>,
    pending: usize,
    written: u64,
}

pub struct DumpWriter {
    graph: String,
    batch_size: usize,
    inner: Mutex<Inner>,
}

impl DumpWriter {
    pub fn new(out: Box<dyn Write + Send>, graph: impl Into<String>, batch_size: usize) -> Self {
        Self {
            graph: graph.into(),
            batch_size: batch_size.max(1),
            inner: Mutex::new(Inner {
                out,
                pending: 0,
                written: 0,
            }),
        }
    }

    /// Open a dump target. `-` writes to stdout.
    pub fn create(path: &Path, graph: impl Into<String>, batch_size: usize) -> Result<Self> {
        let out: Box<dyn Write + Send> = if path.as_os_str() == "-" {
            Box::new(BufWriter::new(std::io::stdout()))
        } else {
            let file = File::create(path).map_err(|e| LibrarianError::filesystem(path, e))?;
            Box::new(BufWriter::new(file))
        };
        Ok(Self::new(out, graph, batch_size))
    }

    pub fn commands_written(&self) -> u64 {
        self.inner.lock().map(|i| i.written).unwrap_or(0)
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }
}

/// One inline pipe command, without the trailing newline.
pub fn format_command(graph: &str, cypher: &str) -> String {
    let mut line = String::with_capacity(cypher.len() + graph.len() + 16);
    line.push_str("GRAPH.QUERY ");
    line.push_str(graph);
    line.push_str(" \"");
    for c in cypher.chars() {
        match c {
            '"' => line.push_str("\\\""),
            '\\' => line.push_str("\\\\"),
            c => line.push(c),
        }
    }
    line.push('"');
    line
}

impl GraphBackend for DumpWriter {
    fn execute(&self, op: &GraphOp) -> Result<()> {
        let line = format_command(&self.graph, &op.to_cypher());
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LibrarianError::Query("dump writer lock poisoned".to_string()))?;
        inner.out.write_all(line.as_bytes())?;
        inner.out.write_all(b"\n")?;
        inner.written += 1;
        inner.pending += 1;
        if inner.pending >= self.batch_size {
            inner.out.flush()?;
            inner.pending = 0;
        }
        Ok(())
    }

    fn query(&self, _query: &GraphQuery) -> Result<Vec<Row>> {
        Err(LibrarianError::Query(
            "dump mode writes commands only and cannot answer queries".to_string(),
        ))
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LibrarianError::Query("dump writer lock poisoned".to_string()))?;
        inner.out.flush()?;
        inner.pending = 0;
        Ok(())
    }
}

impl Drop for DumpWriter {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            let _ = inner.out.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Shared buffer that records how many times it was flushed.
    #[derive(Clone, Default)]
    struct Sink {
        data: Arc<Mutex<Vec<u8>>>,
        flushes: Arc<Mutex<usize>>,
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn tag_op(tag: &str) -> GraphOp {
        GraphOp::Tag {
            path: "/v/a.md".into(),
            tag: tag.into(),
        }
    }

    #[test]
    fn test_format_escapes_quotes_and_backslashes() {
        assert_eq!(
            format_command("g", "MATCH (n {name: 'say \"hi\"\\'})"),
            "GRAPH.QUERY g \"MATCH (n {name: 'say \\\"hi\\\"\\\\'})\""
        );
    }

    #[test]
    fn test_one_line_per_op() {
        let sink = Sink::default();
        let writer = DumpWriter::new(Box::new(sink.clone()), "vault", 100);
        writer.execute(&tag_op("a")).unwrap();
        writer.execute(&tag_op("b")).unwrap();
        writer.flush().unwrap();

        let text = String::from_utf8(sink.data.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("GRAPH.QUERY vault \"MATCH (n:Note"));
        assert_eq!(writer.commands_written(), 2);
    }

    #[test]
    fn test_flushes_every_batch() {
        let sink = Sink::default();
        let writer = DumpWriter::new(Box::new(sink.clone()), "g", 2);
        for i in 0..5 {
            writer.execute(&tag_op(&i.to_string())).unwrap();
        }
        assert_eq!(*sink.flushes.lock().unwrap(), 2);
    }

    #[test]
    fn test_queries_are_rejected() {
        let writer = DumpWriter::new(Box::new(Sink::default()), "g", 1);
        assert!(writer.query(&GraphQuery::Orphans).is_err());
    }
}
