//! Performance benchmarks for outbox-engine

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use outbox_engine::{
    Engine, EntityType, FileStore, MemoryStore, OfflineRecord, OutboxSnapshot, RemoteApplier,
    Result,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

struct Instant;

#[async_trait]
impl RemoteApplier for Instant {
    async fn apply(&self, _record: &OfflineRecord) -> Result<()> {
        Ok(())
    }
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn memory_engine() -> Engine {
    Engine::new(Arc::new(MemoryStore::new()), Arc::new(Instant))
}

fn bench_outbox_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("outbox_operations");
    let rt = runtime();

    group.bench_function("enqueue_memory", |b| {
        let engine = memory_engine();
        b.to_async(&rt).iter(|| async {
            engine
                .enqueue(
                    black_box(EntityType::WorkOrder),
                    black_box(json!({"description": "Oil change"})),
                )
                .await
        })
    });

    group.bench_function("pending_count_1000", |b| {
        let engine = memory_engine();
        rt.block_on(async {
            for i in 0..1000 {
                let _ = engine.enqueue(EntityType::Customer, json!({"n": i})).await;
            }
        });
        b.to_async(&rt).iter(|| async { engine.pending_count().await })
    });

    group.bench_function("list_unsynced_1000", |b| {
        let engine = memory_engine();
        rt.block_on(async {
            for i in 0..1000 {
                let _ = engine.enqueue(EntityType::Inventory, json!({"n": i})).await;
            }
        });
        b.to_async(&rt).iter(|| async { engine.list_unsynced().await })
    });

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");
    let rt = runtime();

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("drain_memory", size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let engine = memory_engine();
                for i in 0..size {
                    let _ = engine.enqueue(EntityType::WorkOrder, json!({"n": i})).await;
                }
                engine.drain().await
            })
        });
    }

    group.bench_function("drain_file_50", |b| {
        b.to_async(&rt).iter(|| async {
            let dir = tempfile::tempdir().unwrap();
            let engine = Engine::new(
                Arc::new(FileStore::new(dir.path().join("outbox.json"))),
                Arc::new(Instant),
            );
            for i in 0..50 {
                let _ = engine.enqueue(EntityType::Customer, json!({"n": i})).await;
            }
            engine.drain().await
        })
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [100, 1000].iter() {
        let mut snapshot = OutboxSnapshot::new();
        for i in 0..*size {
            snapshot.add_record(OfflineRecord::new(
                format!("work_order_{i}_abcdef012"),
                EntityType::WorkOrder,
                json!({"description": format!("Job {i}"), "hours": i}),
                i as u64,
            ));
        }
        let json = snapshot.to_json().unwrap();

        group.bench_with_input(BenchmarkId::new("to_json", size), &snapshot, |b, s| {
            b.iter(|| s.to_json())
        });
        group.bench_with_input(BenchmarkId::new("from_json", size), &json, |b, j| {
            b.iter(|| OutboxSnapshot::from_json(black_box(j)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_outbox_operations, bench_drain, bench_snapshot);
criterion_main!(benches);
