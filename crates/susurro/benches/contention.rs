//! Contention and Timing Benchmarks
//!
//! Benchmarks for the streaming contention kernels and the hybrid sleep.
//!
//! Run with: `cargo bench --bench contention`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::{Duration, Instant};
use susurro::{ContentionGenerator, ContentionMode};

fn bench_burst_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("burst_modes");
    let buffer_size = 1 << 20;
    let mut generator = ContentionGenerator::new(2, buffer_size).expect("generator");
    group.throughput(Throughput::Bytes((buffer_size * 2) as u64));

    for mode in ContentionMode::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |bench, &m| {
            bench.iter(|| {
                let burst = generator.burst(black_box(m)).expect("burst");
                black_box(burst.bytes_per_ns);
            });
        });
    }

    group.finish();
}

fn bench_burst_lengths(c: &mut Criterion) {
    let mut group = c.benchmark_group("burst_lengths");
    let buffer_size = 1 << 22;
    let mut generator = ContentionGenerator::new(1, buffer_size).expect("generator");

    for length in [1 << 16, 1 << 18, 1 << 20, 1 << 22] {
        group.throughput(Throughput::Bytes(length as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_bytes", length)),
            &length,
            |bench, &len| {
                bench.iter(|| {
                    let burst = generator
                        .burst_with_length(ContentionMode::Read, black_box(len))
                        .expect("burst");
                    black_box(burst.elapsed);
                });
            },
        );
    }

    group.finish();
}

fn bench_run_for(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_for");
    group.sample_size(20);
    let mut generator = ContentionGenerator::new(2, 1 << 20).expect("generator");

    for millis in [1u64, 5] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_ms", millis)),
            &millis,
            |bench, &ms| {
                bench.iter(|| {
                    let run = generator
                        .run_for(ContentionMode::Write, Duration::from_millis(ms))
                        .expect("run_for");
                    black_box(run.error_ns);
                });
            },
        );
    }

    group.finish();
}

fn bench_sleep_precision(c: &mut Criterion) {
    let mut group = c.benchmark_group("sleep");
    group.sample_size(30);

    for micros in [100u64, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_us", micros)),
            &micros,
            |bench, &us| {
                bench.iter(|| {
                    let error = susurro::sleep_for(Duration::from_micros(us)).expect("sleep");
                    black_box(error);
                });
            },
        );
    }

    group.bench_function("sleep_until_1ms", |bench| {
        bench.iter(|| {
            let deadline = Instant::now() + Duration::from_millis(1);
            let error = susurro::sleep_until(deadline).expect("sleep_until");
            black_box(error);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_burst_modes,
    bench_burst_lengths,
    bench_run_for,
    bench_sleep_precision
);
criterion_main!(benches);
