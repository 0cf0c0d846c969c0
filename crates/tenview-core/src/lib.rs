//! # tenview-core
//!
//! Strided N-dimensional tensor views over flat `f32` storage, with a
//! fixed-capacity pool carrying failure diagnostics.
//!
//! This crate provides:
//!
//! - **Tensor views** ([`Tensor`]) with per-dimension shape, stride and offset
//! - **Zero-copy view derivation**: permute and slice share storage
//! - **Materialization**: `dupe` (verbatim copy) and `contiguous` (row-major copy)
//! - **Logical-order iteration** ([`TensorIter`]) independent of strides
//! - **Operation engine** ([`ops`]): n-ary map, scalar broadcast, reduction
//! - **Error pool** ([`ErrorPool`]): diagnostic chains in a fixed arena
//! - **Allocator capability** ([`Allocator`]) through which every buffer is obtained
//!
//! ## Core Principles
//!
//! ### Shared, interior-mutable storage
//!
//! Views alias the storage of the tensor they were derived from. Writing an
//! element through any view is visible through every other view; there is no
//! copy-on-write. Storage is released when the last view holding it drops.
//!
//! ### Failures are values
//!
//! Tensor-producing operations never panic on bad input. They return a
//! tensor in the failed state, whose diagnostics (most recent first) live in
//! the context's [`ErrorPool`]. Using a failed tensor as an input extends its
//! chain.
//!
//! ### Safety
//!
//! All indexing is bounds-checked. No unsafe code. An address landing
//! outside storage after validation indicates a broken layout invariant and
//! panics.
//!
//! ## Quick Start
//!
//! ```
//! use tenview_core::{Context, Tensor};
//!
//! let ctx = Context::new();
//!
//! let t = Tensor::create(&ctx, 1.0, &[2, 3]);
//! t.set(&[1, 2], 5.0).unwrap();
//!
//! let p = t.permute(0, 1);
//! assert_eq!(p.shape(), &[3, 2]);
//! assert_eq!(p.get(&[2, 1]).unwrap(), 5.0);
//! ```
//!
//! ## Views
//!
//! ```
//! use tenview_core::{Context, Tensor};
//!
//! let ctx = Context::new();
//! let t = Tensor::range(&ctx, 0.0, 1.0, &[4]);
//!
//! let s = t.slice(&[1], &[3]);
//! assert_eq!(s.to_vec(), vec![1.0, 2.0]);
//!
//! s.set(&[0], 7.0).unwrap();
//! assert_eq!(t.get(&[1]).unwrap(), 7.0);
//! ```
//!
//! ## Error Handling
//!
//! ```
//! use tenview_core::{Context, ErrorKind, Tensor};
//!
//! let ctx = Context::new();
//! let t = Tensor::alloc(&ctx, &[2, 2]);
//!
//! let bad = t.permute(0, 5);
//! assert_eq!(bad.failure_kind(), Some(ErrorKind::IndexOutOfRange));
//!
//! // Failures propagate through later operations
//! let worse = bad.contiguous();
//! assert_eq!(worse.failure().unwrap().messages().len(), 2);
//!
//! // ... and convert into `anyhow` errors at the boundary
//! assert!(worse.into_result().is_err());
//! ```
//!
//! ## Features
//!
//! - `serde`: Serialization of configuration and shape types
//! - `tracing`: Install `tracing-subscriber` output via [`tracing_support`]

#![forbid(unsafe_code)]

pub mod alloc;
pub mod context;
pub mod dense;
pub mod error;
pub mod failure;
pub mod ops;
pub mod pool;
pub mod tracing_support;
pub mod types;

#[cfg(test)]
mod property_tests;

pub use alloc::{Allocator, Block, BoundedAllocator, SystemAllocator};
pub use context::{Context, ContextBuilder, ScirsUniform, UniformSource};
pub use dense::{Ownership, Tensor, TensorIter, TensorState};
pub use error::{ErrorKind, TensorError, TensorResult};
pub use failure::Failure;
pub use pool::{
    Chain, ChainLink, ErrorPool, ErrorRef, ExhaustionPolicy, PoolConfig, PoolError, Provenance,
    UNIT_BYTES,
};
pub use types::{row_major_strides, Axis, IndexVec, Rank, Shape};
