//! Dump-mode vs direct-mode sync throughput
//!
//! Both modes sync the same parsed vault. Direct mode runs against an
//! in-memory graph with a fixed per-operation delay standing in for a
//! network round trip; dump mode serializes into a sink.
//!
//! Run with: cargo bench --bench sync_modes

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::fs;
use std::path::Path;
use std::time::Duration;

use librarian::config::SourceRoot;
use librarian::scan::ScanContext;
use librarian::{
    build_pool, full_scan, DumpWriter, FileMetadata, LibrarianConfig, MemoryGraph, ProjectRoots,
    SyncEngine, SyncMode,
};

const NOTES: usize = 200;
const CODE_FILES: usize = 50;
const ROUND_TRIP: Duration = Duration::from_micros(50);

fn write_vault(root: &Path) {
    for i in 0..NOTES {
        let body = format!(
            "# Note {i}\n\n#topic{} links [[Note{}]] and [[Note{}]]\n\n- [ ] task {i}\nTODO: follow up\n",
            i % 10,
            (i + 1) % NOTES,
            (i + 7) % NOTES,
        );
        fs::write(root.join(format!("Note{}.md", i)), body).unwrap();
    }
    for i in 0..CODE_FILES {
        let body = format!(
            "import os\nimport json\n\nclass Handler{i}:\n    def run(self):\n        pass\n\ndef helper_{i}():\n    return {i}\n"
        );
        fs::write(root.join(format!("module_{}.py", i)), body).unwrap();
    }
}

fn parsed_records(root: &Path) -> (LibrarianConfig, Vec<FileMetadata>) {
    let mut config = LibrarianConfig::default();
    config.sources = vec![SourceRoot {
        name: "bench".to_string(),
        path: root.to_path_buf(),
        enabled: true,
        priority: 100,
    }];
    let roots = ScanContext::new(&config).unwrap().configured_roots();
    let pool = build_pool(config.worker_count()).unwrap();
    let output = full_scan(&config, &roots, None, &pool, None).unwrap();
    (config, output.records)
}

fn benchmark_sync_modes(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    write_vault(dir.path());
    let (config, records) = parsed_records(dir.path());
    let pool = build_pool(config.worker_count()).unwrap();

    let mut group = c.benchmark_group("sync_modes");
    group.sample_size(10);
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("dump", |b| {
        b.iter(|| {
            let writer = DumpWriter::new(Box::new(std::io::sink()), "bench", 500);
            let engine = SyncEngine::new(&writer, ProjectRoots::default(), SyncMode::Dump);
            black_box(engine.sync_all(black_box(&records), None, None).unwrap());
        })
    });

    let graph = MemoryGraph::with_latency(ROUND_TRIP);
    group.bench_function("direct", |b| {
        b.iter(|| {
            let engine = SyncEngine::new(&graph, ProjectRoots::default(), SyncMode::Direct);
            black_box(engine.sync_all(black_box(&records), Some(&pool), None).unwrap());
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_sync_modes);
criterion_main!(benches);
