#[macro_use]
extern crate criterion;

use criterion::{BenchmarkId, Criterion};
use strand::{make_ready, spawn, then, when_all, when_any, Handle};

fn bench_spawn(c: &mut Criterion) {
    c.bench_function("spawn_join", |b| b.iter(|| spawn(|| 1u64).join()));
}

fn bench_then_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("then_chain");
    for depth in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                (0..depth)
                    .fold(make_ready(0u64), |handle, _| then(handle, |h| h.join() + 1))
                    .join()
            })
        });
    }
    group.finish();
}

fn bench_when_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("when_all");
    for width in [2usize, 16, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let handles = (0..width as u64).map(|i| spawn(move || i)).collect::<Vec<_>>();
                when_all(handles).join()
            })
        });
    }
    group.finish();
}

fn bench_when_any(c: &mut Criterion) {
    let mut group = c.benchmark_group("when_any");
    for width in [2usize, 16, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let handles: Vec<Handle<u64>> = (0..width as u64).map(|i| spawn(move || i)).collect();
                when_any(handles).join().into_winner().join()
            })
        });
    }
    group.finish();
}

criterion_group!(
    combinators,
    bench_spawn,
    bench_then_chain,
    bench_when_all,
    bench_when_any
);
criterion_main!(combinators);
