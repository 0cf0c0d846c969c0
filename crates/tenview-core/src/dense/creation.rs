//! Tensor creation and initialization methods
//!
//! Every constructor allocates fresh row-major storage through the context's
//! allocator and returns an owning tensor, or a failed tensor when the
//! allocator refuses.

use super::types::{Layout, Storage, Tensor, View};
use crate::context::Context;
use crate::error::{TensorError, TensorResult};
use crate::provenance;
use crate::types::IndexVec;

impl Tensor {
    /// Allocate storage and row-major layout for `shape`, zero-filled.
    pub(crate) fn try_alloc(ctx: &Context, shape: &[usize]) -> TensorResult<View> {
        let shape = IndexVec::new(shape);
        let size = shape
            .checked_product()
            .ok_or(TensorError::AllocationFailure { bytes: usize::MAX })?;
        let storage = Storage::zeroed(ctx, size)?;
        let layout = Layout::row_major(ctx, shape)?;
        Ok(View { storage, layout })
    }

    /// Allocate `shape` and initialize every storage slot with `fill`.
    fn alloc_with(
        ctx: &Context,
        shape: &[usize],
        op: &'static str,
        mut fill: impl FnMut(usize) -> f32,
    ) -> Tensor {
        match Self::try_alloc(ctx, shape) {
            Ok(view) => {
                for (i, cell) in view.storage.cells().iter().enumerate() {
                    cell.set(fill(i));
                }
                Tensor::owned(ctx, view)
            }
            Err(err) => Tensor::failed(ctx, err, provenance!(op)),
        }
    }

    /// Allocate a zero-filled tensor.
    ///
    /// The storage holds `product(shape)` elements (one for a scalar), the
    /// strides are row-major and every offset is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::alloc(&ctx, &[2, 3]);
    /// assert_eq!(t.stride(), &[3, 1]);
    /// assert_eq!(t.to_vec(), vec![0.0; 6]);
    /// ```
    pub fn alloc(ctx: &Context, shape: &[usize]) -> Tensor {
        match Self::try_alloc(ctx, shape) {
            Ok(view) => Tensor::owned(ctx, view),
            Err(err) => Tensor::failed(ctx, err, provenance!("alloc")),
        }
    }

    /// Create a tensor with every element set to `fill`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::create(&ctx, 1.5, &[2, 2]);
    /// assert_eq!(t.to_vec(), vec![1.5; 4]);
    /// ```
    pub fn create(ctx: &Context, fill: f32, shape: &[usize]) -> Tensor {
        Self::alloc_with(ctx, shape, "create", |_| fill)
    }

    /// Create a tensor of values drawn from the context's uniform source.
    ///
    /// # Arguments
    ///
    /// * `min` - Lower bound (inclusive)
    /// * `max` - Upper bound (exclusive)
    /// * `shape` - The shape of the tensor
    pub fn random(ctx: &Context, min: f32, max: f32, shape: &[usize]) -> Tensor {
        Self::alloc_with(ctx, shape, "random", |_| ctx.uniform(min, max))
    }

    /// Fill storage positions with `start, start + step, ...`.
    ///
    /// The progression follows physical storage order. A fresh tensor is
    /// row-major, so this coincides with logical order until the tensor is
    /// viewed through a permutation.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::range(&ctx, 0.0, 1.0, &[2, 2]);
    /// assert_eq!(t.to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
    /// assert_eq!(t.permute(0, 1).to_vec(), vec![0.0, 2.0, 1.0, 3.0]);
    /// ```
    pub fn range(ctx: &Context, start: f32, step: f32, shape: &[usize]) -> Tensor {
        Self::alloc_with(ctx, shape, "range", |i| start + step * i as f32)
    }

    /// Create a tensor from values in row-major logical order.
    ///
    /// Fails with a shape mismatch when `values.len()` differs from the
    /// number of elements `shape` describes.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::from_slice(&ctx, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    /// assert_eq!(t.get(&[1, 0]).unwrap(), 4.0);
    ///
    /// let bad = Tensor::from_slice(&ctx, &[1.0, 2.0], &[3]);
    /// assert!(bad.is_failed());
    /// ```
    pub fn from_slice(ctx: &Context, values: &[f32], shape: &[usize]) -> Tensor {
        let expected = IndexVec::new(shape).checked_product();
        if expected != Some(values.len()) {
            let err = TensorError::shape_mismatch(
                "from_slice element count",
                [expected.unwrap_or(usize::MAX)],
                [values.len()],
            );
            return Tensor::failed(ctx, err, provenance!("from_slice"));
        }
        Self::alloc_with(ctx, shape, "from_slice", |i| values[i])
    }
}
