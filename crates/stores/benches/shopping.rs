use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use larder_sync_core::Category;
use larder_sync_stores::{MemoryLocalStore, PushHandle, StoreSet};

fn filled_stores(items: usize) -> StoreSet {
    let stores = StoreSet::open(Arc::new(MemoryLocalStore::new()), PushHandle::disconnected());
    for index in 0..items {
        stores
            .shopping
            .add_item(format!("item-{index}"), 1.0, "pc", Category::Pantry);
        stores
            .pantry
            .add_item(format!("staple-{index}"), 1.0, "pc", Category::Pantry);
    }
    stores
}

fn bench_add_aggregating(c: &mut Criterion) {
    let mut group = c.benchmark_group("shopping_add_aggregating");

    for items in [10_usize, 100, 1_000] {
        let stores = filled_stores(items);
        group.bench_with_input(BenchmarkId::new("items", items), &items, |b, _| {
            b.iter(|| {
                // Re-adds an existing row, exercising the scan-and-merge path.
                let row = stores.shopping.add_item("Item-0", 1.0, "pc", Category::Pantry);
                black_box(row);
            });
        });
    }

    group.finish();
}

fn bench_aggregate_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_set_aggregate");

    for items in [10_usize, 100, 1_000] {
        let stores = filled_stores(items);
        group.bench_with_input(BenchmarkId::new("items", items), &items, |b, _| {
            b.iter(|| {
                let aggregate = stores.aggregate();
                black_box(aggregate);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_add_aggregating, bench_aggregate_snapshot);
criterion_main!(benches);
