//! End-to-end generation pass benchmarks.
//!
//! Run with: `cargo bench --bench generation`
//!
//! Each iteration starts from an empty cache, so every measured call runs a
//! full pass: builder invocations, placeholder issuance and the commit.

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use memograph::prelude::*;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Sum(u64),
    Back(PlaceholderHandle<Node>),
}

/// A chain `n -> n-1 -> ... -> 0` with no cycles.
fn chain_cache() -> Cache<u64, u64> {
    CacheBuilder::new()
        .builder(|ctx: &mut GenerationContext<u64, u64>, key: &u64| {
            if *key == 0 {
                return Ok(0);
            }
            Ok(ctx.try_get_or_build(&(key - 1))?.unwrap_or(0) + key)
        })
        .build()
}

/// A ring of `size` keys where every key depends on its successor, so the
/// root's dependency closes the cycle through a forwarding placeholder.
fn ring_cache(size: u64) -> Cache<u64, Node> {
    CacheBuilder::new()
        .builder(move |ctx: &mut GenerationContext<u64, Node>, key: &u64| {
            let next = (key + 1) % size;
            match ctx.try_get_or_build(&next)? {
                Some(Node::Sum(sum)) => Ok(Node::Sum(sum + key)),
                _ => Ok(Node::Sum(*key)),
            }
        })
        .placeholder_factory(|_: &u64| PlaceholderValue::forwarding(Node::Back))
        .build()
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_chain");
    for depth in [16u64, 128, 512] {
        group.throughput(Throughput::Elements(depth + 1));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                chain_cache,
                |cache| black_box(cache.get_or_add(&depth)),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_ring");
    for size in [4u64, 64, 256] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || ring_cache(size),
                |cache| black_box(cache.get_or_add(&0)),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_failure_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("failure_replay");
    let cache: Cache<u64, u64> = CacheBuilder::new()
        .builder(|_: &mut GenerationContext<u64, u64>, _: &u64| {
            Err(EngineError::derivation(std::fmt::Error))
        })
        .cache_failures(true)
        .build();
    let _ = cache.get_or_add(&1);

    group.bench_function("memoized", |b| {
        b.iter(|| black_box(cache.get_or_add(black_box(&1))))
    });
    group.finish();
}

criterion_group!(passes, bench_chain, bench_ring);
criterion_group!(failures, bench_failure_replay);
criterion_main!(passes, failures);
