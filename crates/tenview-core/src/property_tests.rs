//! Property-based tests for views, iteration and the error pool
//!
//! This module uses proptest to verify layout invariants across a wide range
//! of randomly generated shapes, permutations and windows.

#[cfg(test)]
mod tests {
    use crate::ops;
    use crate::pool::{ErrorPool, PoolConfig, Provenance};
    use crate::{Context, ErrorKind, Tensor};
    use proptest::prelude::*;
    use std::collections::HashSet;

    // Strategy for generating valid tensor shapes (1-4D, reasonable sizes)
    fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(1usize..6, 1..=4)
    }

    // A shape together with two axes of it
    fn shape_and_axes() -> impl Strategy<Value = (Vec<usize>, usize, usize)> {
        shape_strategy().prop_flat_map(|shape| {
            let rank = shape.len();
            (Just(shape), 0..rank, 0..rank)
        })
    }

    // A shape with a non-empty window inside it
    fn shape_and_window() -> impl Strategy<Value = (Vec<usize>, Vec<usize>, Vec<usize>)> {
        shape_strategy()
            .prop_flat_map(|shape| {
                let starts: Vec<_> = shape.iter().map(|&d| 0..d).collect();
                (Just(shape), starts)
            })
            .prop_flat_map(|(shape, start)| {
                let ends: Vec<_> = shape
                    .iter()
                    .zip(&start)
                    .map(|(&d, &s)| (s + 1)..=d)
                    .collect();
                (Just(shape), Just(start), ends)
            })
    }

    #[test]
    fn test_proptest_smoke() {
        let ctx = Context::new();
        let tensor = Tensor::alloc(&ctx, &[2, 3]);
        assert_eq!(tensor.shape(), &[2, 3]);
    }

    proptest! {
        #[test]
        fn prop_addr_injective_on_fresh_tensor(shape in shape_strategy()) {
            let ctx = Context::new();
            let t = Tensor::alloc(&ctx, &shape);
            let addrs: HashSet<usize> = t.iter().map(|idx| t.addr(&idx).unwrap()).collect();
            prop_assert_eq!(addrs.len(), t.numel());
            prop_assert!(addrs.iter().all(|&a| a < t.storage_len()));
        }

        #[test]
        fn prop_write_then_read(shape in shape_strategy(), value in -1e6f32..1e6) {
            let ctx = Context::new();
            let t = Tensor::alloc(&ctx, &shape);
            let last: Vec<usize> = shape.iter().map(|&d| d - 1).collect();
            t.set(&last, value).unwrap();
            prop_assert_eq!(t.get(&last).unwrap(), value);
        }

        #[test]
        fn prop_iteration_visits_numel_indices(shape in prop::collection::vec(0usize..5, 0..=4)) {
            let ctx = Context::new();
            let t = Tensor::alloc(&ctx, &shape);
            let expected: usize = shape.iter().product();
            prop_assert_eq!(t.iter().count(), expected);
        }

        #[test]
        fn prop_permute_in_place_involution((shape, i, j) in shape_and_axes()) {
            let ctx = Context::new();
            let mut t = Tensor::range(&ctx, 0.0, 1.0, &shape);
            let before = (t.shape().to_vec(), t.stride().to_vec(), t.offset().to_vec());
            t.permute_in_place(i, j).unwrap();
            t.permute_in_place(i, j).unwrap();
            prop_assert_eq!(before, (t.shape().to_vec(), t.stride().to_vec(), t.offset().to_vec()));
        }

        #[test]
        fn prop_permuted_view_aliases((shape, i, j) in shape_and_axes()) {
            let ctx = Context::new();
            let t = Tensor::range(&ctx, 0.0, 1.0, &shape);
            let p = t.permute(i, j);
            for idx in p.iter() {
                let mut src = idx.clone();
                src.swap(i, j);
                prop_assert_eq!(p.get(&idx).unwrap(), t.get(&src).unwrap());
            }
        }

        #[test]
        fn prop_contiguous_idempotent((shape, i, j) in shape_and_axes()) {
            let ctx = Context::new();
            let t = Tensor::range(&ctx, 0.0, 1.0, &shape).permute(i, j);
            let once = t.contiguous();
            let twice = once.contiguous();
            prop_assert_eq!(once.to_vec(), twice.to_vec());
            prop_assert_eq!(twice.storage_to_vec(), twice.to_vec());
            prop_assert_eq!(once.to_vec(), t.to_vec());
        }

        #[test]
        fn prop_slice_matches_source((shape, start, end) in shape_and_window()) {
            let ctx = Context::new();
            let t = Tensor::range(&ctx, 0.0, 1.0, &shape);
            let s = t.slice(&start, &end);
            prop_assert!(!s.is_failed());
            for idx in s.iter() {
                let src: Vec<usize> = idx.iter().zip(&start).map(|(&i, &o)| i + o).collect();
                prop_assert_eq!(s.get(&idx).unwrap(), t.get(&src).unwrap());
            }
        }

        #[test]
        fn prop_reduce_matches_manual_fold((shape, axis, _j) in shape_and_axes()) {
            let ctx = Context::new();
            let t = Tensor::range(&ctx, 1.0, 1.0, &shape);
            let r = ops::reduce(&ctx, &t, axis, ops::scalar::add);
            for out_idx in r.iter() {
                let mut full: Vec<usize> = out_idx.to_vec();
                full.insert(axis, 0);
                let mut expected = 0.0;
                for p in 0..shape[axis] {
                    full[axis] = p;
                    expected += t.get(&full).unwrap();
                }
                prop_assert_eq!(r.get(&out_idx).unwrap(), expected);
            }
        }

        #[test]
        fn prop_pool_conserves_units(lens in prop::collection::vec(0usize..80, 1..12)) {
            let mut pool = ErrorPool::new(PoolConfig::new(64));
            let prov = Provenance::new("prop.rs", "prop", 1);
            let mut live = Vec::new();
            for len in &lens {
                let msg = "m".repeat(*len);
                let kind = ErrorKind::ShapeMismatch;
                if let Ok(r) = pool.new_error(None, kind, prov, format_args!("{msg}")) {
                    live.push(r);
                }
                let used: usize = pool.capacity_units() - pool.free_units();
                prop_assert!(used <= pool.capacity_units());
            }
            for r in live {
                pool.release(r).unwrap();
            }
            prop_assert_eq!(pool.free_units(), 64);
            let sizes = pool.free_run_sizes();
            prop_assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
