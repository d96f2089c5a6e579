//! Criterion benchmarks for the pool hot path.
//!
//! Measures one producer/worker round trip (acquire, enqueue, dequeue,
//! release) and the exhausted-acquire drop path, for a tiny and a
//! full-resolution geometry.
//!
//! Run with: cargo bench -p rgbd-pool --bench pool_cycle

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rgbd_core::{Resolution, SensorGeometry};
use rgbd_pool::BufferPool;

fn pool_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_round_trip");

    let geometries = [
        (
            "tiny",
            SensorGeometry::new(Resolution::new(16, 16), Resolution::new(8, 8)),
        ),
        ("kinect_v2", SensorGeometry::KINECT_V2),
    ];

    for (name, geometry) in geometries {
        let pool = BufferPool::new(4, geometry).unwrap();
        group.bench_with_input(BenchmarkId::new("cycle", name), &pool, |b, pool| {
            b.iter(|| {
                let buf = pool.acquire_free().unwrap();
                black_box(pool.enqueue_pending(buf));
                let job = pool.dequeue_pending().unwrap();
                pool.release(job);
            });
        });
    }

    group.finish();
}

fn pool_exhausted_acquire(c: &mut Criterion) {
    let geometry = SensorGeometry::new(Resolution::new(16, 16), Resolution::new(8, 8));
    let pool = BufferPool::new(1, geometry).unwrap();
    let _held = pool.acquire_free().unwrap();

    c.bench_function("pool_exhausted_acquire", |b| {
        b.iter(|| black_box(pool.acquire_free().is_none()));
    });
}

criterion_group!(benches, pool_round_trip, pool_exhausted_acquire);
criterion_main!(benches);
