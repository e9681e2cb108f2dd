//! Benchmark for the subnet allocator
//!
//! Splitting a /16 into /28s yields 4096 candidates; configure excludes
//! sibling clusters' subnets from them, shuffles and slices.

use cluster_forge::net::{parse_cidr, Subnets};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ipnet::Ipv4Net;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sibling_subnets(n: usize) -> Vec<Ipv4Net> {
    (0..n)
        .filter_map(|i| parse_cidr(&format!("10.33.{}.{}/28", i / 16, (i % 16) * 16)).ok())
        .collect()
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("subnets");
    group.throughput(Throughput::Elements(4096));

    group.bench_function("split_16_into_28", |b| {
        b.iter(|| {
            let _ = Subnets::parse(black_box("10.33.0.0/16"), black_box(28));
        });
    });

    group.finish();
}

fn bench_exclude(c: &mut Criterion) {
    let mut group = c.benchmark_group("subnets");
    let excluded = sibling_subnets(256);
    group.throughput(Throughput::Elements(excluded.len() as u64));

    group.bench_function("exclude_256_siblings", |b| {
        b.iter(|| {
            if let Ok(mut subnets) = Subnets::parse("10.33.0.0/16", 28) {
                subnets.exclude(black_box(&excluded));
                black_box(subnets.len());
            }
        });
    });

    group.finish();
}

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("subnets");
    group.throughput(Throughput::Elements(1));
    let excluded = sibling_subnets(64);

    group.bench_function("exclude_shuffle_slice", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| {
            if let Ok(mut subnets) = Subnets::parse("10.33.0.0/16", 28) {
                subnets.exclude(&excluded).shuffle_with(&mut rng);
                let _ = subnets.slice(black_box(3));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_split, bench_exclude, bench_allocate);
criterion_main!(benches);
