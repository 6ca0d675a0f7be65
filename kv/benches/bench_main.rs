use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kv::store::StoreEngine;

/// Round-trips a single-key transaction: begin, read, write, commit. No
/// contention, so every commit succeeds first try — this measures the
/// engine-wide-lock hot path, not the retry machinery.
fn uncontended_round_trip(n: u64) {
    let store: StoreEngine<String, u64> = StoreEngine::new();
    for id in 0..n as i64 {
        store.begin(id).unwrap();
        let _ = store.read(&"k".to_string(), id).unwrap();
        store.write("k".to_string(), black_box(id as u64), id).unwrap();
        store.commit(id).unwrap();
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("uncontended round trip x1000", |b| {
        b.iter(|| uncontended_round_trip(black_box(1000)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
