//! Context switch and spawn/retire costs

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use uthread::{spawn, yield_now, Runtime, SchedulerConfig};

const ROUNDS: u32 = 1_000;

fn bench_yield_round_trip(c: &mut Criterion) {
    let mut rt = Runtime::new(SchedulerConfig::new()).unwrap();

    c.bench_function("yield_ping_pong_1000", |b| {
        b.iter(|| {
            rt.block_on(|| {
                spawn(|| {
                    for _ in 0..ROUNDS {
                        yield_now().unwrap();
                    }
                })
                .unwrap();
                for _ in 0..ROUNDS {
                    yield_now().unwrap();
                }
            })
            .unwrap()
        })
    });
}

fn bench_spawn_retire(c: &mut Criterion) {
    let mut rt = Runtime::new(SchedulerConfig::new()).unwrap();

    c.bench_function("spawn_retire_100", |b| {
        b.iter_batched(
            || 100u32,
            |n| {
                rt.block_on(move || {
                    for i in 0..n {
                        spawn(move || {
                            black_box(i);
                        })
                        .unwrap();
                    }
                })
                .unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_yield_round_trip, bench_spawn_retire);
criterion_main!(benches);
