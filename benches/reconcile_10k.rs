use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::collections::HashSet;
use std::time::Duration;

use roundwatch::awaiter::AwaiterRegistry;
use roundwatch::reconciler::reconcile;
use roundwatch::types::{Phase, RoundId, RoundKey, RoundState, RoundTable};
use tokio_util::sync::CancellationToken;

const N: usize = 10_000;

// deterministic rounds, ids derived from the index
fn gen_rounds(n: usize, version: u64) -> Vec<RoundState> {
    (0..n)
        .map(|i| {
            let mut id = [0u8; 32];
            id[..8].copy_from_slice(&(i as u64).to_be_bytes());
            RoundState {
                coinjoin_state_version: version,
                ..RoundState::new(RoundId::new(id), Phase::InputRegistration)
            }
        })
        .collect()
}

fn bench_reconcile_10k(c: &mut Criterion) {
    let previous: RoundTable = gen_rounds(N, 0).into_iter().map(|r| (r.id, r)).collect();

    let mut group = c.benchmark_group("reconcile_10k");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    // ---------- identical fetch: nothing changes ----------
    group.bench_function(BenchmarkId::new("unchanged", N), |b| {
        b.iter_batched(
            || gen_rounds(N, 0),
            |fetched| black_box(reconcile(&previous, fetched)),
            BatchSize::LargeInput,
        )
    });

    // ---------- every round bumped ----------
    group.bench_function(BenchmarkId::new("all_updated", N), |b| {
        b.iter_batched(
            || gen_rounds(N, 1),
            |fetched| black_box(reconcile(&previous, fetched)),
            BatchSize::LargeInput,
        )
    });

    // ---------- registry tick with one awaiter per round ----------
    group.bench_function(BenchmarkId::new("registry_tick", N), |b| {
        b.iter_batched(
            || {
                let registry = AwaiterRegistry::new();
                let awaiters: Vec<_> = previous
                    .keys()
                    .map(|id| registry.register(RoundKey::Round(*id), |_| true, CancellationToken::new()))
                    .collect();
                let changed: HashSet<RoundId> = previous.keys().copied().collect();
                (registry, awaiters, changed)
            },
            |(registry, awaiters, changed)| {
                black_box(registry.reconcile_tick(&previous, &changed));
                awaiters
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_reconcile_10k);
criterion_main!(benches);
