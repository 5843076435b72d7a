//! RemoteGraph against a minimal in-process RESP server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use librarian::config::{DatabaseConfig, SourceRoot};
use librarian::graph::schema::NodeLabel;
use librarian::scan::{project_roots, ScanContext};
use librarian::{
    build_pool, collect_stats, full_scan, GraphBackend, GraphOp, LibrarianConfig, LibrarianError,
    RemoteGraph, SyncEngine, SyncMode,
};

type Log = Arc<Mutex<Vec<Vec<String>>>>;

struct FakeServer {
    address: String,
    commands: Log,
}

impl FakeServer {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let commands: Log = Arc::default();
        let log = commands.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let log = log.clone();
                thread::spawn(move || serve(stream, log));
            }
        });
        Self { address, commands }
    }

    fn graph_queries(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some("GRAPH.QUERY"))
            .map(|c| c[2].clone())
            .collect()
    }

    fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            address: self.address.clone(),
            graph: "vault".to_string(),
            connect_timeout_ms: 1_000,
            io_timeout_ms: 2_000,
            ..DatabaseConfig::default()
        }
    }
}

fn read_command(reader: &mut BufReader<TcpStream>) -> Option<Vec<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).ok()?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).ok()?);
    }
    Some(args)
}

fn reply_for(args: &[String]) -> String {
    match args.first().map(String::as_str) {
        Some("PING") => "+PONG\r\n".to_string(),
        Some("GRAPH.QUERY") => {
            let cypher = &args[2];
            if cypher.contains("boom") {
                "-ERR Invalid input 'boom'\r\n".to_string()
            } else if cypher.contains("count(") {
                "*3\r\n*1\r\n$5\r\ncount\r\n*1\r\n*1\r\n:7\r\n*1\r\n$4\r\ndone\r\n".to_string()
            } else {
                "*1\r\n*1\r\n$16\r\nNodes created: 1\r\n".to_string()
            }
        }
        _ => "-ERR unknown command\r\n".to_string(),
    }
}

fn serve(stream: TcpStream, log: Log) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    while let Some(args) = read_command(&mut reader) {
        let reply = reply_for(&args);
        log.lock().unwrap().push(args);
        if writer.write_all(reply.as_bytes()).is_err() {
            break;
        }
    }
}

#[test]
fn test_connect_pings_and_executes_ops() {
    let server = FakeServer::start();
    let remote = RemoteGraph::connect(&server.database(), 2).unwrap();

    let op = GraphOp::Tag {
        path: "/vault/First.md".to_string(),
        tag: "todo".to_string(),
    };
    remote.execute(&op).unwrap();

    let queries = server.graph_queries();
    assert_eq!(queries, vec![op.to_cypher()]);
    let first = server.commands.lock().unwrap()[0].clone();
    assert_eq!(first, vec!["PING".to_string()]);
    let graph_arg = server.commands.lock().unwrap()[1][1].clone();
    assert_eq!(graph_arg, "vault");
}

#[test]
fn test_counts_come_from_tabular_replies() {
    let server = FakeServer::start();
    let remote = RemoteGraph::connect(&server.database(), 1).unwrap();

    let stats = collect_stats(&remote).unwrap();
    assert_eq!(stats.node_count(NodeLabel::Note), 7);
    assert_eq!(stats.node_count(NodeLabel::Task), 7);
    assert_eq!(stats.placeholders, 7);
    assert!(server
        .graph_queries()
        .iter()
        .any(|q| q.contains("n.path IS NULL")));
}

#[test]
fn test_server_error_is_query_error_and_keeps_connection() {
    let server = FakeServer::start();
    let remote = RemoteGraph::connect(&server.database(), 1).unwrap();

    let op = GraphOp::Tag {
        path: "/vault/boom.md".to_string(),
        tag: "x".to_string(),
    };
    let err = remote.execute(&op).unwrap_err();
    assert!(matches!(err, LibrarianError::Query(_)), "{:?}", err);

    remote
        .execute(&GraphOp::Tag {
            path: "/vault/ok.md".to_string(),
            tag: "x".to_string(),
        })
        .unwrap();
    assert_eq!(remote.pool().open_connections(), 1);
}

#[test]
fn test_unreachable_server_is_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let config = DatabaseConfig {
        address,
        connect_timeout_ms: 500,
        ..DatabaseConfig::default()
    };
    match RemoteGraph::connect(&config, 1) {
        Err(err @ LibrarianError::Connection { .. }) => assert!(err.is_connection_fatal()),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("connected to a closed port"),
    }
}

fn vault(root: &Path) -> LibrarianConfig {
    std::fs::write(root.join("A.md"), "#alpha [[B]]\n").unwrap();
    std::fs::write(root.join("B.md"), "- [ ] follow up\n").unwrap();
    let mut config = LibrarianConfig::default();
    config.sources = vec![SourceRoot {
        name: "vault".to_string(),
        path: root.to_path_buf(),
        enabled: true,
        priority: 100,
    }];
    config.scan.workers = 2;
    config
}

#[test]
fn test_direct_sync_sends_every_operation() {
    let server = FakeServer::start();
    let dir = tempfile::tempdir().unwrap();
    let config = vault(dir.path());

    let remote = RemoteGraph::connect(&server.database(), config.effective_pool_size()).unwrap();
    let pool = build_pool(config.worker_count()).unwrap();
    let engine = SyncEngine::new(&remote, project_roots(&config), SyncMode::Direct);
    let roots = ScanContext::new(&config).unwrap().configured_roots();
    let output = full_scan(&config, &roots, Some(&engine), &pool, None).unwrap();

    assert_eq!(output.summary.succeeded, 2);
    assert_eq!(output.summary.failed, 0);
    assert_eq!(server.graph_queries().len(), output.summary.operations);
    assert!(remote.pool().open_connections() <= config.effective_pool_size());
}
