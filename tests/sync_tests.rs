//! End-to-end scan and sync tests against the in-memory graph.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use librarian::config::SourceRoot;
use librarian::graph::schema::{EdgeType, NodeLabel};
use librarian::scan::{project_roots, ScanContext};
use librarian::{
    build_pool, collect_stats, full_scan, DumpWriter, GraphBackend, LibrarianConfig, MemoryGraph,
    SyncEngine, SyncMode,
};

fn config_for(root: &Path) -> LibrarianConfig {
    let mut config = LibrarianConfig::default();
    config.sources = vec![SourceRoot {
        name: "vault".to_string(),
        path: root.to_path_buf(),
        enabled: true,
        priority: 100,
    }];
    config.scan.workers = 1;
    config
}

fn write_fixture(root: &Path) {
    fs::write(root.join("First.md"), "# First\n\nTagged #todo and see [[Second]].\n").unwrap();
    fs::write(root.join("Second.md"), "# Second\n\nNothing here.\n").unwrap();
    fs::write(root.join("Third.md"), "plain text\n").unwrap();
    fs::write(root.join("Fourth.md"), "TODO: review this\n").unwrap();
    fs::write(
        root.join("app.js"),
        "import React from 'react';\n\nfunction handleClick(e) {\n  return e;\n}\n",
    )
    .unwrap();
}

fn roots(config: &LibrarianConfig) -> Vec<PathBuf> {
    ScanContext::new(config).unwrap().configured_roots()
}

fn scan_into(config: &LibrarianConfig, backend: &dyn GraphBackend, mode: SyncMode) {
    let pool = build_pool(config.worker_count()).unwrap();
    let engine = SyncEngine::new(backend, project_roots(config), mode);
    let output = full_scan(config, &roots(config), Some(&engine), &pool, None).unwrap();
    assert_eq!(output.summary.failed, 0, "{:?}", output.summary.diagnostics);
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn dump_text(config: &LibrarianConfig) -> String {
    let buf = SharedBuf::default();
    let writer = DumpWriter::new(Box::new(buf.clone()), "librarian", 50);
    scan_into(config, &writer, SyncMode::Dump);
    writer.flush().unwrap();
    let bytes = buf.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_scan_produces_expected_counts() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());

    let graph = MemoryGraph::new();
    scan_into(&config, &graph, SyncMode::Direct);

    let stats = collect_stats(&graph).unwrap();
    assert_eq!(stats.node_count(NodeLabel::Note), 4);
    assert_eq!(stats.node_count(NodeLabel::Code), 1);
    assert_eq!(stats.node_count(NodeLabel::Tag), 1);
    assert_eq!(stats.node_count(NodeLabel::Task), 1);
    assert_eq!(stats.node_count(NodeLabel::Function), 1);
    assert_eq!(stats.node_count(NodeLabel::Module), 1);
    assert_eq!(stats.node_count(NodeLabel::Project), 0);
    assert_eq!(stats.edge_count(EdgeType::LinksTo), 1);
    assert_eq!(stats.edge_count(EdgeType::Tagged), 1);
    assert_eq!(stats.edge_count(EdgeType::HasTask), 1);
    assert_eq!(stats.edge_count(EdgeType::Defines), 1);
    assert_eq!(stats.edge_count(EdgeType::Imports), 1);
    assert_eq!(graph.dangling_edges(), 0);
}

#[test]
fn test_rescan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());

    let graph = MemoryGraph::new();
    scan_into(&config, &graph, SyncMode::Direct);
    let first = graph.fingerprint();
    scan_into(&config, &graph, SyncMode::Direct);
    assert_eq!(graph.fingerprint(), first);
}

#[test]
fn test_dump_output_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());

    let first = dump_text(&config);
    let second = dump_text(&config);
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert!(first.contains("GRAPH.QUERY"));
}

#[test]
fn test_direct_and_dump_modes_agree_on_graph_shape() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());

    let direct = MemoryGraph::new();
    scan_into(&config, &direct, SyncMode::Direct);

    // Sequential sync into a second graph through the dump ordering.
    let sequential = MemoryGraph::new();
    scan_into(&config, &sequential, SyncMode::Dump);
    assert_eq!(direct.fingerprint(), sequential.fingerprint());
}

#[test]
fn test_edit_converges_to_new_content() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());

    let graph = MemoryGraph::new();
    scan_into(&config, &graph, SyncMode::Direct);
    assert_eq!(collect_stats(&graph).unwrap().edge_count(EdgeType::Tagged), 1);

    fs::write(dir.path().join("First.md"), "# First\n\nNo tags, see [[Third]].\n").unwrap();
    scan_into(&config, &graph, SyncMode::Direct);

    let stats = collect_stats(&graph).unwrap();
    assert_eq!(stats.edge_count(EdgeType::Tagged), 0);
    assert_eq!(stats.edge_count(EdgeType::LinksTo), 1);
    assert_eq!(stats.node_count(NodeLabel::Note), 4);
    assert_eq!(graph.dangling_edges(), 0);
}

#[test]
fn test_delete_removes_file_and_owned_nodes() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());

    let graph = MemoryGraph::new();
    scan_into(&config, &graph, SyncMode::Direct);

    let app = fs::canonicalize(dir.path().join("app.js")).unwrap();
    let engine = SyncEngine::new(&graph, project_roots(&config), SyncMode::Direct);
    engine.delete_file(&app.to_string_lossy()).unwrap();

    let stats = collect_stats(&graph).unwrap();
    assert_eq!(stats.node_count(NodeLabel::Code), 0);
    assert_eq!(stats.node_count(NodeLabel::Function), 0);
    assert_eq!(stats.edge_count(EdgeType::Imports), 0);
    assert_eq!(graph.dangling_edges(), 0);
}

#[test]
fn test_unresolved_link_creates_placeholder_then_claimed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Alpha.md"), "see [[Beta]]\n").unwrap();
    let config = config_for(dir.path());

    let graph = MemoryGraph::new();
    scan_into(&config, &graph, SyncMode::Direct);
    let stats = collect_stats(&graph).unwrap();
    assert_eq!(stats.node_count(NodeLabel::Note), 1);
    assert_eq!(stats.placeholders, 1);

    fs::write(dir.path().join("Beta.md"), "now real\n").unwrap();
    scan_into(&config, &graph, SyncMode::Direct);

    let stats = collect_stats(&graph).unwrap();
    assert_eq!(stats.node_count(NodeLabel::Note), 2);
    assert_eq!(stats.placeholders, 0);
    assert_eq!(stats.edge_count(EdgeType::LinksTo), 1);
}

#[test]
fn test_classification_and_skips_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("note.md"), "hello\n").unwrap();
    fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
    fs::write(dir.path().join("readme.txt"), "unknown\n").unwrap();
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    fs::write(dir.path().join(".git/config.md"), "ignored\n").unwrap();
    let config = config_for(dir.path());

    let graph = MemoryGraph::new();
    let pool = build_pool(1).unwrap();
    let engine = SyncEngine::new(&graph, project_roots(&config), SyncMode::Direct);
    let output = full_scan(&config, &roots(&config), Some(&engine), &pool, None).unwrap();

    assert_eq!(output.summary.assets, 1);
    assert_eq!(output.summary.succeeded, 1);
    assert_eq!(output.records.len(), 1);
    let stats = collect_stats(&graph).unwrap();
    assert_eq!(stats.node_count(NodeLabel::Note), 1);
    assert_eq!(stats.node_count(NodeLabel::Code), 0);
}

#[test]
fn test_project_membership_from_project_roots() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("projects/app");
    fs::create_dir_all(&app).unwrap();
    fs::write(app.join("main.py"), "import os\n\ndef run():\n    pass\n").unwrap();
    fs::write(app.join("Notes.md"), "about app\n").unwrap();

    let mut config = config_for(dir.path());
    config.projects.roots = vec![dir.path().join("projects")];

    let graph = MemoryGraph::new();
    scan_into(&config, &graph, SyncMode::Direct);

    let stats = collect_stats(&graph).unwrap();
    assert_eq!(stats.node_count(NodeLabel::Project), 1);
    assert_eq!(stats.edge_count(EdgeType::Contains), 2);
}
