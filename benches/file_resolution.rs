//! Benchmarks for file resolution and repository synchronization.
//!
//! Everything runs against the in-memory remote, so the numbers measure the
//! resolver, the listing cache and the synchronizer rather than the network.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dockstore_sync::config::Settings;
use dockstore_sync::context::SyncContext;
use dockstore_sync::github::memory::InMemoryRemote;
use dockstore_sync::path::join_normalized;
use dockstore_sync::sync::VersionSynchronizer;

const REPO: &str = "octo/bench";

/// A repository with `num_files` descriptors spread over directories of
/// one hundred, plus a manifest declaring the first one.
fn create_remote(num_files: usize) -> Arc<InMemoryRemote> {
    let remote = InMemoryRemote::new();
    remote.add_repository(REPO, "main", false);

    let mut files: Vec<(String, String)> = (0..num_files)
        .map(|i| {
            (
                format!("/steps/group{}/step{}.cwl", i / 100, i),
                "cwlVersion: v1.2\nclass: CommandLineTool\n".to_string(),
            )
        })
        .collect();
    files.push((
        "/wf.cwl".to_string(),
        "cwlVersion: v1.2\nclass: Workflow\ninputs: []\noutputs: []\nsteps:\n  a:\n    run: steps/group0/step0.cwl\n"
            .to_string(),
    ));
    files.push((
        "/.dockstore.yml".to_string(),
        "version: 1.2\nworkflows:\n  - subclass: CWL\n    primaryDescriptorPath: /wf.cwl\n".to_string(),
    ));
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(path, content)| (path.as_str(), content.as_str()))
        .collect();

    remote.commit(REPO, "c1", None, &borrowed);
    remote.add_symlink(REPO, "c1", "/linked", "steps/group0");
    remote.set_branch(REPO, "main", "c1");
    for i in 0..10 {
        remote.set_tag(REPO, &format!("v{}", i), "c1", i % 2 == 0);
    }
    Arc::new(remote)
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver_read");

    for count in [10, 100, 1000] {
        let remote = create_remote(count);

        group.bench_with_input(BenchmarkId::new("cold", count), &count, |b, _| {
            b.iter(|| {
                let ctx = SyncContext::new(remote.clone(), Settings::default());
                ctx.resolver()
                    .read(REPO, "main", black_box("/steps/group0/step0.cwl"))
                    .unwrap()
            })
        });

        let ctx = SyncContext::new(remote.clone(), Settings::default());
        group.bench_with_input(BenchmarkId::new("warm", count), &count, |b, _| {
            b.iter(|| {
                ctx.resolver()
                    .read(REPO, "main", black_box("/steps/group0/step0.cwl"))
                    .unwrap()
            })
        });
    }

    let remote = create_remote(100);
    let ctx = SyncContext::new(remote, Settings::default());
    group.bench_function("through_symlink", |b| {
        b.iter(|| {
            ctx.resolver()
                .read(REPO, "main", black_box("/linked/step1.cwl"))
                .unwrap()
        })
    });

    group.finish();
}

fn bench_join(c: &mut Criterion) {
    c.bench_function("join_normalized", |b| {
        b.iter(|| {
            join_normalized(
                black_box("/workflows/align/"),
                black_box("../../tools/./sort/sort.cwl"),
            )
        })
    });
}

fn bench_process_repository(c: &mut Criterion) {
    let remote = create_remote(100);

    c.bench_function("process_repository", |b| {
        b.iter(|| {
            let ctx = SyncContext::new(remote.clone(), Settings::default());
            VersionSynchronizer::new(&ctx)
                .process_repository(black_box(REPO))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_read, bench_join, bench_process_repository);
criterion_main!(benches);
