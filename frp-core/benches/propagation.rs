use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use frp_core::graph::Node;
use frp_core::reactive::{
    execute_on, map, map_cache, sink, source, transform, Derived, ThreadPool,
};

/// A linear chain of `len` increment nodes on top of one source.
fn chain(len: usize) -> (frp_core::Source<u64>, Derived<u64>) {
    let top = source(0_u64);
    let mut tail = transform(|x: &u64| x + 1, (top.clone(),));
    for _ in 1..len {
        tail = transform(|x: &u64| x + 1, (tail,));
    }
    (top, tail)
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");

    for len in [1_usize, 16, 256] {
        let (top, tail) = chain(len);
        let result = sink(tail);
        let mut next = 0_u64;
        group.bench_function(format!("assign(len={len})"), |b| {
            b.iter(|| {
                next += 1;
                top.assign(next);
                black_box(result.value().ok());
            })
        });
    }

    group.finish();
}

fn bench_diamond(c: &mut Criterion) {
    let top = source(0_i64);
    let left = transform(|x: &i64| x + 1, (top.clone(),));
    let right = transform(|x: &i64| x * 2, (top.clone(),));
    let bottom = sink(transform(|l: &i64, r: &i64| l * r, (left, right)));
    let mut next = 0_i64;

    c.bench_function("diamond_assign", |b| {
        b.iter(|| {
            next += 1;
            top.assign(next);
            black_box(bottom.value().ok());
        })
    });
}

const ELEMENTS: u64 = 1_024;

fn hash(x: &u64) -> u64 {
    x.wrapping_mul(2_654_435_761)
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    group.sample_size(30);

    {
        let numbers = source((0..ELEMENTS).collect::<Vec<_>>());
        let mapped = map(hash, numbers.clone());
        let mut round = 0_u64;
        group.bench_function("map_immediate", |b| {
            b.iter(|| {
                round += 1;
                numbers.assign((round..round + ELEMENTS).collect());
                black_box(mapped.revision());
            })
        });
    }

    {
        let numbers = source((0..ELEMENTS).collect::<Vec<_>>());
        let cached = map_cache(hash, numbers.clone());
        let mut round = 0_u64;
        group.bench_function("map_cache_shift_by_one", |b| {
            b.iter(|| {
                round += 1;
                numbers.assign((round..round + ELEMENTS).collect());
                black_box(cached.revision());
            })
        });
    }

    {
        let pool = Arc::new(ThreadPool::new(4).expect("spawn workers"));
        let numbers = source((0..ELEMENTS).collect::<Vec<_>>());
        let pooled = map(execute_on(pool.clone(), hash), numbers.clone());
        let mut round = 0_u64;
        group.bench_function("map_thread_pool", |b| {
            b.iter(|| {
                round += 1;
                numbers.assign((round..round + ELEMENTS).collect());
                pool.wait_idle();
                black_box(pooled.revision());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chain, bench_diamond, bench_fan_out);
criterion_main!(benches);
