//! Generation benchmarks

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use parcelsim_core::{Layout, TimeWindow};
use parcelsim_generator::{
    allocate, plan_work, AllocationConfig, BatchProducer, FixedPartition, ItemDetailPayload,
    Lifecycle,
};

fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 7, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    let lifecycle = Lifecycle::default();
    let window = window();
    let mut rng = rand::thread_rng();

    group.throughput(Throughput::Elements(1));
    group.bench_function("generate_one", |b| {
        b.iter(|| black_box(lifecycle.generate(&mut rng, window.start, window.end)));
    });

    group.finish();
}

fn bench_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_produce");
    let plan = allocate(
        10_000,
        7,
        &[FixedPartition::new(1_000_011, 500_000)],
        &AllocationConfig::default(),
    )
    .unwrap();

    for size in [1_000usize, 10_000].iter() {
        let items = plan_work(&plan, *size);
        let item = &items[0];
        group.throughput(Throughput::Elements(item.entities));

        let append = BatchProducer::new(Layout::AppendOnly, window());
        group.bench_function(format!("append_{}", size), |b| {
            let mut rng = rand::thread_rng();
            b.iter(|| black_box(append.produce(item, &mut rng)));
        });

        let flat = BatchProducer::new(Layout::FlatSnapshot, window())
            .with_payload(Box::new(ItemDetailPayload));
        group.bench_function(format!("flat_item_detail_{}", size), |b| {
            let mut rng = rand::thread_rng();
            b.iter(|| black_box(flat.produce(item, &mut rng)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lifecycle, bench_batches);
criterion_main!(benches);
