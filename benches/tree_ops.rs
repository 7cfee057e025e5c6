use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ctree_db::{Database, MemoryStore, TreeConfig};
use std::sync::Arc;

fn key(i: u32) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[..4].copy_from_slice(&i.wrapping_mul(2_654_435_761).to_be_bytes());
    key[4..].copy_from_slice(&i.to_be_bytes());
    key
}

fn populated(n: u32) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let db = Database::with_store(Arc::clone(&store), TreeConfig::default()).unwrap();
    for i in 0..n {
        db.insert(&key(i), &i.to_le_bytes()).unwrap();
    }
    db.flush().unwrap();
    store
}

fn bench_insert_and_flush(c: &mut Criterion) {
    c.bench_function("insert_1k_and_flush", |b| {
        b.iter_batched(
            || Database::with_store(MemoryStore::new(), TreeConfig::default()).unwrap(),
            |db| {
                for i in 0..1_000u32 {
                    db.insert(&key(i), &i.to_le_bytes()).unwrap();
                }
                black_box(db.flush().unwrap())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_cold_get(c: &mut Criterion) {
    let store = populated(10_000);
    c.bench_function("cold_get_from_10k", |b| {
        b.iter_batched(
            || Database::with_store(Arc::clone(&store), TreeConfig::default()).unwrap(),
            |db| black_box(db.get(&key(4_242)).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_cold_commit(c: &mut Criterion) {
    let store = populated(10_000);
    c.bench_function("cold_commit_from_10k", |b| {
        b.iter_batched(
            || Database::with_store(Arc::clone(&store), TreeConfig::default()).unwrap(),
            |db| black_box(db.commit().unwrap()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_insert_and_flush, bench_cold_get, bench_cold_commit);
criterion_main!(benches);
