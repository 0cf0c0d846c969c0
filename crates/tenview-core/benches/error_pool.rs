//! Benchmarks for diagnostic recording and release in the error pool.
//!
//! Run with:
//! ```bash
//! cargo bench --bench error_pool
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use tenview_core::{Context, ErrorKind, ErrorPool, PoolConfig, Provenance, Tensor};

/// Benchmark record/release churn with varying message lengths
fn bench_record_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_release");
    let prov = Provenance::new("bench.rs", "churn", 1);

    for &len in &[8usize, 64, 512] {
        let msg = "x".repeat(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &msg, |b, msg| {
            let mut pool = ErrorPool::new(PoolConfig::new(1024));
            b.iter(|| {
                let r = pool
                    .new_error(None, ErrorKind::ShapeMismatch, prov, format_args!("{msg}"))
                    .unwrap();
                pool.release(black_box(r)).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark chains that force reclamation of their oldest records
fn bench_reclaim(c: &mut Criterion) {
    let prov = Provenance::new("bench.rs", "reclaim", 1);

    c.bench_function("reclaim_chain_16", |b| {
        let mut pool = ErrorPool::new(PoolConfig::new(48));
        b.iter(|| {
            let mut head = None;
            for i in 0..16 {
                let kind = ErrorKind::InvalidTensor;
                let Ok(next) = pool.new_error(head, kind, prov, format_args!("step {i:>32}")) else {
                    break;
                };
                if let Some(prev) = head.replace(next) {
                    let _ = pool.release(prev);
                }
            }
            if let Some(last) = head {
                let _ = pool.release(last);
            }
            black_box(pool.free_units())
        });
    });
}

/// Benchmark failure propagation through tensor operations
fn bench_failed_propagation(c: &mut Criterion) {
    let ctx = Context::new();
    let t = Tensor::alloc(&ctx, &[4, 4]);

    c.bench_function("failed_propagation", |b| {
        b.iter(|| {
            let bad = t.permute(0, black_box(7));
            black_box(bad.contiguous())
        });
    });
}

criterion_group!(
    benches,
    bench_record_release,
    bench_reclaim,
    bench_failed_propagation
);

criterion_main!(benches);
