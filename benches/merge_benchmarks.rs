use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use vault_sync::clock::ManualClock;
use vault_sync::prelude::*;

fn replica(rng: &mut StdRng, size: usize) -> Collection<Item<u64>> {
    Collection::from_items((0..size).map(|i| {
        Item::with_timestamp(
            format!("item-{i:06}"),
            rng.gen(),
            Timestamp::from_millis(rng.gen_range(1..10_000)),
        )
    }))
    .with_last_merged(Timestamp::from_millis(5_000))
}

/// Derive a peer that shares most records, edits some and drops some.
fn diverged(rng: &mut StdRng, base: &Collection<Item<u64>>) -> Collection<Item<u64>> {
    let mut kept = Vec::with_capacity(base.len());
    for record in base.iter() {
        match rng.gen_range(0..10) {
            0 => {}
            1 => {
                let mut edited = record.clone();
                edited.updated = Some(Timestamp::from_millis(rng.gen_range(1..20_000)));
                kept.push(edited);
            }
            _ => kept.push(record.clone()),
        }
    }
    Collection::from_items(kept).with_last_merged(base.last_merged())
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("Collection::merge");
    let clock = ManualClock::new(50_000);

    for size in [100usize, 1_000, 10_000] {
        let mut rng = StdRng::seed_from_u64(size as u64);
        let local = replica(&mut rng, size);
        let remote = diverged(&mut rng, &local);

        group.bench_with_input(BenchmarkId::new("diverged", size), &size, |b, _| {
            b.iter(|| {
                let mut merged = local.clone();
                let report = merged.merge_with(&remote, &clock).unwrap();
                black_box(report.forward.len())
            })
        });

        group.bench_with_input(BenchmarkId::new("identical", size), &size, |b, _| {
            b.iter(|| {
                let mut merged = local.clone();
                let report = merged.merge_with(&local, &clock).unwrap();
                black_box(report.applied.len())
            })
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let local = replica(&mut rng, 1_000);
    let json = serde_json::to_string(&local).unwrap();

    c.bench_function("Collection serialize 1000 records", |b| {
        b.iter(|| black_box(serde_json::to_string(&local).unwrap()))
    });

    c.bench_function("Collection deserialize 1000 records", |b| {
        b.iter(|| {
            let restored: Collection<Item<u64>> = serde_json::from_str(&json).unwrap();
            black_box(restored.len())
        })
    });
}

criterion_group!(benches, bench_merge, bench_snapshot);
criterion_main!(benches);
