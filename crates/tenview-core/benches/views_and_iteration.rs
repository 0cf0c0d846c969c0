//! Benchmarks for view derivation, logical-order iteration and reduction.
//!
//! Run with:
//! ```bash
//! cargo bench --bench views_and_iteration
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tenview_core::{ops, Context, Tensor};

/// Benchmark zero-copy view derivation
fn bench_view_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_derivation");
    let ctx = Context::new();
    let t = Tensor::range(&ctx, 0.0, 1.0, &[64, 64, 16]);

    group.bench_function("permute", |b| {
        b.iter(|| black_box(t.permute(black_box(0), black_box(2))));
    });

    group.bench_function("slice", |b| {
        b.iter(|| black_box(t.slice(black_box(&[8, 8, 0]), black_box(&[56, 56, 16]))));
    });

    group.finish();
}

/// Benchmark iteration over contiguous and permuted layouts
fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("iteration");
    let ctx = Context::new();

    for &size in &[16usize, 64, 256] {
        let t = Tensor::range(&ctx, 0.0, 1.0, &[size, size]);
        let p = t.permute(0, 1);
        group.throughput(Throughput::Elements((size * size) as u64));

        group.bench_with_input(BenchmarkId::new("row_major", size), &t, |b, t| {
            b.iter(|| {
                let mut it = t.iter();
                let mut acc = 0.0f32;
                while it.advance() {
                    acc += it.get();
                }
                black_box(acc)
            });
        });

        group.bench_with_input(BenchmarkId::new("permuted", size), &p, |b, p| {
            b.iter(|| {
                let mut it = p.iter();
                let mut acc = 0.0f32;
                while it.advance() {
                    acc += it.get();
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

/// Benchmark materializing strided views
fn bench_contiguous(c: &mut Criterion) {
    let mut group = c.benchmark_group("contiguous");
    let ctx = Context::new();

    for &size in &[16usize, 64, 256] {
        let view = Tensor::range(&ctx, 0.0, 1.0, &[size, size]).permute(0, 1);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &view, |b, v| {
            b.iter(|| black_box(v.contiguous()));
        });
    }

    group.finish();
}

/// Benchmark elementwise maps and axis reduction
fn bench_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("ops");
    let ctx = Context::new();
    let a = Tensor::random(&ctx, -1.0, 1.0, &[128, 128]);
    let b_t = Tensor::random(&ctx, -1.0, 1.0, &[128, 128]);
    group.throughput(Throughput::Elements(128 * 128));

    group.bench_function("add", |b| {
        b.iter(|| black_box(ops::add(&ctx, &a, &b_t)));
    });

    group.bench_function("vmul", |b| {
        b.iter(|| black_box(ops::vmul(&ctx, black_box(0.5), &a)));
    });

    for axis in 0..2 {
        group.bench_with_input(BenchmarkId::new("reduce_add", axis), &axis, |b, &axis| {
            b.iter(|| black_box(ops::reduce(&ctx, &a, axis, ops::scalar::add)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_view_derivation,
    bench_iteration,
    bench_contiguous,
    bench_ops
);

criterion_main!(benches);
