//! # tenview - Strided Tensor Views over Flat Storage
//!
//! Multidimensional `f32` tensors described by shape, stride and offset,
//! derived views that share storage, an operation engine that reports
//! failures as values, and a fixed-capacity pool for their diagnostics.
//!
//! This is the **meta crate** that re-exports the tenview components for
//! convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use tenview::prelude::*;
//!
//! let ctx = Context::new();
//! let t = Tensor::range(&ctx, 0.0, 1.0, &[3, 4]);
//!
//! // Column sums
//! let sums = ops::reduce(&ctx, &t, 0, ops::scalar::add);
//! assert_eq!(sums.to_vec(), vec![12.0, 15.0, 18.0, 21.0]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Core Tensor Views ([`core`])
//!
//! Tensors, views, iteration, operations, the allocator capability and the
//! error pool.
//!
//! ```
//! use tenview::core::{Context, Tensor};
//!
//! let ctx = Context::new();
//! let t = Tensor::create(&ctx, 2.0, &[2, 3]);
//! let p = t.permute(0, 1);
//! assert_eq!(p.shape(), &[3, 2]);
//! assert!(p.shares_storage_with(&t));
//! ```
//!
//! ### Diagnostics
//!
//! Failed operations keep a chain of messages, most recent first, that
//! converts into an [`anyhow::Error`](https://docs.rs/anyhow) at the boundary.
//!
//! ```
//! use tenview::prelude::*;
//!
//! let ctx = Context::new();
//! let t = Tensor::alloc(&ctx, &[2]);
//! let bad = ops::vadd(&ctx, 1.0, &t.slice(&[1], &[3]));
//! assert_eq!(bad.failure_kind(), Some(ErrorKind::InvalidTensor));
//! assert!(bad.into_result().is_err());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialization of configuration and shape types
//! - `tracing`: Subscriber installation through `core::tracing_support`

#![deny(warnings)]

pub use tenview_core as core;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use tenview::prelude::*;
    //!
    //! let ctx = Context::new();
    //! let tensor = Tensor::alloc(&ctx, &[10, 20, 30]);
    //! ```

    // Tensors and views
    pub use crate::core::{Ownership, Tensor, TensorIter, TensorState};

    // Operations
    pub use crate::core::ops;

    // Context and allocation
    pub use crate::core::{Allocator, BoundedAllocator, Context, SystemAllocator};

    // Errors and diagnostics
    pub use crate::core::{
        ErrorKind, ErrorPool, ExhaustionPolicy, Failure, PoolConfig, TensorError, TensorResult,
    };
}
