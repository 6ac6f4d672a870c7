//! # Cluster View Benchmarks
//!
//! | Path | Operation |
//! |------|-----------|
//! | join | allocate index, create engine record, add forwarding |
//! | filter delivery | sequence check, engine apply, persist |
//! | delete and sweep | fence, tombstone, free index after grace |

use bc_01_cluster_view::test_utils::{join_metadata, make_node, RecordingEngine, ViewKeeperHarness};
use bc_01_cluster_view::{ClusterViewConfig, FilterKind, FilterUpdate, MembershipEvent, NodeMetadata};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn populated(servers: u32) -> ViewKeeperHarness {
    let config = ClusterViewConfig {
        max_servers: servers.max(1),
        ..ClusterViewConfig::for_testing()
    };
    let harness = ViewKeeperHarness::with_engine(config, RecordingEngine::new());
    harness.complete_recovery(1);
    for i in 0..servers {
        let uid = format!("S{i}");
        let _ = harness.keeper.on_membership_event(MembershipEvent::join(
            1,
            make_node(&uid, 1),
            join_metadata(&uid, 7000 + i as u16),
        ));
    }
    harness
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("view-join");
    for size in [16u32, 128, 512] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("join_servers", size), &size, |b, &size| {
            b.iter(|| black_box(populated(size)))
        });
    }
    group.finish();
}

fn bench_filter_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("view-filters");
    let harness = populated(1);
    let node = make_node("S0", 1);
    let _ = harness.keeper.on_membership_event(MembershipEvent::metadata_change(
        1,
        node.clone(),
        NodeMetadata::new().with_filter(FilterUpdate::base(FilterKind::ExactBloom, 1, vec![0; 64])),
    ));

    let mut sqn = 1;
    group.bench_function("contiguous_update", |b| {
        b.iter(|| {
            sqn += 1;
            let event = MembershipEvent::metadata_change(
                1,
                node.clone(),
                NodeMetadata::new().with_filter(FilterUpdate::update(
                    FilterKind::ExactBloom,
                    sqn,
                    vec![0; 64],
                )),
            );
            black_box(harness.keeper.on_membership_event(event).is_ok())
        })
    });
    group.finish();
}

fn bench_delete_and_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("view-delete");
    group.bench_function("delete_128_and_sweep", |b| {
        b.iter(|| {
            let harness = populated(128);
            for i in 0..128 {
                if let Some(handle) = harness.keeper.handle_for_uid(&format!("S{i}")) {
                    let _ = harness.keeper.admin_delete_node(handle);
                }
            }
            harness.clock.advance(harness.keeper.config().deleted_node_grace_period.as_millis() as u64);
            black_box(harness.keeper.sweep_deleted())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_join, bench_filter_delivery, bench_delete_and_sweep);
criterion_main!(benches);
