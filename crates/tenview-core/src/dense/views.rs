//! View derivation and materialization
//!
//! `permute` and `slice` produce borrowed views sharing the source storage
//! with freshly leased metadata. `dupe` and `contiguous` allocate new storage.

use super::types::{Layout, Storage, Tensor, TensorState, View};
use crate::error::{TensorError, TensorResult};
use crate::provenance;
use crate::types::IndexVec;
use std::rc::Rc;

fn check_axis(axis: usize, ndim: usize) -> TensorResult<()> {
    if axis >= ndim {
        return Err(TensorError::out_of_range("axis", axis, ndim));
    }
    Ok(())
}

impl Tensor {
    /// Borrowed view with axes `i` and `j` exchanged.
    ///
    /// Shape, stride and offset entries of the two axes are swapped; storage
    /// is untouched. `i == j` yields an identical view.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::alloc(&ctx, &[2, 3, 4]);
    /// let p = t.permute(0, 2);
    /// assert_eq!(p.shape(), &[4, 3, 2]);
    /// assert_eq!(p.stride(), &[1, 4, 12]);
    /// assert!(!p.owns_storage());
    ///
    /// assert!(t.permute(0, 3).is_failed());
    /// ```
    pub fn permute(&self, i: usize, j: usize) -> Tensor {
        let view = match self.view() {
            Ok(view) => view,
            Err(_) => {
                return Tensor::failed_input(
                    &self.ctx,
                    self,
                    "permute input",
                    provenance!("permute"),
                );
            }
        };
        let derived = check_axis(i, view.layout.shape.len())
            .and_then(|()| check_axis(j, view.layout.shape.len()))
            .and_then(|()| {
                let mut layout = view.layout.duplicate(&self.ctx)?;
                swap_axes(&mut layout, i, j);
                Ok(View {
                    storage: Rc::clone(&view.storage),
                    layout,
                })
            });
        match derived {
            Ok(view) => {
                tracing::trace!(i, j, shape = %view.layout.shape, "permuted view");
                Tensor::borrowed(&self.ctx, view)
            }
            Err(err) => Tensor::failed(&self.ctx, err, provenance!("permute")),
        }
    }

    /// Exchange axes `i` and `j` of this tensor's own layout.
    ///
    /// Applying the same swap twice restores the original layout.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexOutOfRange`] if either axis is not below
    /// `ndim`, or [`TensorError::InvalidTensor`] for a failed tensor.
    pub fn permute_in_place(&mut self, i: usize, j: usize) -> TensorResult<()> {
        let ndim = self.view()?.layout.shape.len();
        check_axis(i, ndim)?;
        check_axis(j, ndim)?;
        match &mut self.state {
            TensorState::Owned(view) | TensorState::Borrowed(view) => {
                swap_axes(&mut view.layout, i, j);
                Ok(())
            }
            TensorState::Failed(_) => Err(TensorError::InvalidTensor { name: "tensor" }),
        }
    }

    /// Borrowed view of the half-open window `start..end` on every axis.
    ///
    /// The new shape is `end - start` and the new offset is the old offset
    /// plus `start`; strides are inherited.
    ///
    /// Fails with a shape mismatch when `start` or `end` has the wrong
    /// length, and with an invalid range unless `start[i] < shape[i]`,
    /// `end[i] <= shape[i]` and `start[i] <= end[i]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::range(&ctx, 0.0, 1.0, &[4]);
    /// let s = t.slice(&[1], &[3]);
    /// assert_eq!(s.to_vec(), vec![1.0, 2.0]);
    ///
    /// s.set(&[0], 9.0).unwrap();
    /// assert_eq!(t.get(&[1]).unwrap(), 9.0);
    /// ```
    pub fn slice(&self, start: &[usize], end: &[usize]) -> Tensor {
        let view = match self.view() {
            Ok(view) => view,
            Err(_) => {
                return Tensor::failed_input(
                    &self.ctx,
                    self,
                    "slice input",
                    provenance!("slice"),
                );
            }
        };
        match self.slice_layout(view, start, end) {
            Ok(layout) => {
                tracing::trace!(shape = %layout.shape, offset = %layout.offset, "sliced view");
                Tensor::borrowed(
                    &self.ctx,
                    View {
                        storage: Rc::clone(&view.storage),
                        layout,
                    },
                )
            }
            Err(err) => Tensor::failed(&self.ctx, err, provenance!("slice")),
        }
    }

    fn slice_layout(&self, view: &View, start: &[usize], end: &[usize]) -> TensorResult<Layout> {
        let shape = &view.layout.shape;
        for (what, bounds) in [("slice start", start), ("slice end", end)] {
            if bounds.len() != shape.len() {
                return Err(TensorError::shape_mismatch(
                    what,
                    [shape.len()],
                    [bounds.len()],
                ));
            }
        }
        let mut new_shape = IndexVec::zeros(shape.len());
        let mut new_offset = view.layout.offset.clone();
        for axis in 0..shape.len() {
            let (s, e, extent) = (start[axis], end[axis], shape[axis]);
            if s >= extent || e > extent || s > e {
                return Err(TensorError::InvalidRange {
                    axis,
                    start: s,
                    end: e,
                    extent,
                });
            }
            new_shape[axis] = e - s;
            new_offset[axis] += s;
        }
        Layout::new(&self.ctx, new_shape, view.layout.stride.clone(), new_offset)
    }

    /// Owning copy with the storage duplicated verbatim.
    ///
    /// The copy keeps the source's stride and offset, so a strided view stays
    /// strided.
    pub fn dupe(&self) -> Tensor {
        let view = match self.view() {
            Ok(view) => view,
            Err(_) => {
                return Tensor::failed_input(
                    &self.ctx,
                    self,
                    "dupe input",
                    provenance!("dupe"),
                );
            }
        };
        let copied = Storage::zeroed(&self.ctx, view.storage.len()).and_then(|storage| {
            for (dst, src) in storage.cells().iter().zip(view.storage.cells()) {
                dst.set(src.get());
            }
            let layout = view.layout.duplicate(&self.ctx)?;
            Ok(View { storage, layout })
        });
        match copied {
            Ok(view) => Tensor::owned(&self.ctx, view),
            Err(err) => Tensor::failed(&self.ctx, err, provenance!("dupe")),
        }
    }

    /// Owning row-major copy filled in logical order.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::range(&ctx, 0.0, 1.0, &[2, 3]);
    /// let c = t.permute(0, 1).contiguous();
    /// assert_eq!(c.shape(), &[3, 2]);
    /// assert_eq!(c.storage_to_vec(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    /// ```
    pub fn contiguous(&self) -> Tensor {
        let view = match self.view() {
            Ok(view) => view,
            Err(_) => {
                return Tensor::failed_input(
                    &self.ctx,
                    self,
                    "contiguous input",
                    provenance!("contiguous"),
                );
            }
        };
        match Tensor::try_alloc(&self.ctx, &view.layout.shape) {
            Ok(fresh) => {
                for (cell, idx) in fresh.storage.cells().iter().zip(self.iter()) {
                    cell.set(view.load(&idx));
                }
                Tensor::owned(&self.ctx, fresh)
            }
            Err(err) => Tensor::failed(&self.ctx, err, provenance!("contiguous")),
        }
    }
}

fn swap_axes(layout: &mut Layout, i: usize, j: usize) {
    layout.shape.swap(i, j);
    layout.stride.swap(i, j);
    layout.offset.swap(i, j);
}

#[cfg(test)]
mod tests {
    use crate::alloc::BoundedAllocator;
    use crate::error::{ErrorKind, TensorError};
    use crate::{Context, Tensor};
    use std::rc::Rc;

    #[test]
    fn test_permute_aliases_storage() {
        let ctx = Context::new();
        let t = Tensor::range(&ctx, 0.0, 1.0, &[2, 3]);
        let p = t.permute(0, 1);
        assert_eq!(p.get(&[2, 1]).unwrap(), 5.0);
        p.set(&[0, 1], 42.0).unwrap();
        assert_eq!(t.get(&[1, 0]).unwrap(), 42.0);
    }

    #[test]
    fn test_permute_same_axis_is_identity() {
        let ctx = Context::new();
        let t = Tensor::range(&ctx, 0.0, 1.0, &[2, 3]);
        let p = t.permute(1, 1);
        assert_eq!(p.shape(), t.shape());
        assert_eq!(p.stride(), t.stride());
        assert_eq!(p.to_vec(), t.to_vec());
    }

    #[test]
    fn test_permute_swaps_offsets() {
        let ctx = Context::new();
        let t = Tensor::range(&ctx, 0.0, 1.0, &[3, 4]);
        let s = t.slice(&[1, 2], &[3, 4]);
        let p = s.permute(0, 1);
        assert_eq!(p.offset(), &[2, 1]);
        assert_eq!(p.get(&[0, 1]).unwrap(), s.get(&[1, 0]).unwrap());
    }

    #[test]
    fn test_permute_in_place_involution() {
        let ctx = Context::new();
        let mut t = Tensor::range(&ctx, 0.0, 1.0, &[2, 3, 4]);
        let (shape, stride) = (t.shape().to_vec(), t.stride().to_vec());
        t.permute_in_place(0, 2).unwrap();
        assert_eq!(t.shape(), &[4, 3, 2]);
        t.permute_in_place(0, 2).unwrap();
        assert_eq!(t.shape(), shape.as_slice());
        assert_eq!(t.stride(), stride.as_slice());
    }

    #[test]
    fn test_permute_in_place_rejects_bad_axis() {
        let ctx = Context::new();
        let mut t = Tensor::alloc(&ctx, &[2, 2]);
        assert_eq!(
            t.permute_in_place(0, 2).unwrap_err(),
            TensorError::out_of_range("axis", 2, 2)
        );
        assert_eq!(t.shape(), &[2, 2]);
    }

    #[test]
    fn test_slice_2d_window() {
        let ctx = Context::new();
        let t = Tensor::range(&ctx, 0.0, 1.0, &[3, 4]);
        let s = t.slice(&[1, 1], &[3, 3]);
        assert_eq!(s.shape(), &[2, 2]);
        assert_eq!(s.stride(), &[4, 1]);
        assert_eq!(s.offset(), &[1, 1]);
        assert_eq!(s.to_vec(), vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_slice_of_slice_accumulates_offset() {
        let ctx = Context::new();
        let t = Tensor::range(&ctx, 0.0, 1.0, &[8]);
        let s = t.slice(&[2], &[7]).slice(&[1], &[3]);
        assert_eq!(s.offset(), &[3]);
        assert_eq!(s.to_vec(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_slice_validation() {
        let ctx = Context::new();
        let t = Tensor::alloc(&ctx, &[4]);
        assert_eq!(t.slice(&[4], &[4]).failure_kind(), Some(ErrorKind::InvalidRange));
        assert_eq!(t.slice(&[0], &[5]).failure_kind(), Some(ErrorKind::InvalidRange));
        assert_eq!(t.slice(&[3], &[1]).failure_kind(), Some(ErrorKind::InvalidRange));
        assert_eq!(t.slice(&[0, 0], &[1, 1]).failure_kind(), Some(ErrorKind::ShapeMismatch));
        // empty window
        assert_eq!(t.slice(&[2], &[2]).numel(), 0);
    }

    #[test]
    fn test_dupe_preserves_layout_and_detaches() {
        let ctx = Context::new();
        let t = Tensor::range(&ctx, 0.0, 1.0, &[2, 3]);
        let p = t.permute(0, 1);
        let d = p.dupe();
        assert!(d.owns_storage());
        assert!(!d.shares_storage_with(&t));
        assert_eq!(d.stride(), p.stride());
        assert_eq!(d.storage_to_vec(), t.storage_to_vec());
        d.set(&[0, 0], -1.0).unwrap();
        assert_eq!(t.get(&[0, 0]).unwrap(), 0.0);
    }

    #[test]
    fn test_contiguous_of_slice() {
        let ctx = Context::new();
        let t = Tensor::range(&ctx, 0.0, 1.0, &[3, 4]);
        let c = t.slice(&[0, 1], &[2, 3]).contiguous();
        assert!(c.is_contiguous());
        assert_eq!(c.storage_len(), 4);
        assert_eq!(c.storage_to_vec(), vec![1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_failed_input_chains() {
        let ctx = Context::new();
        let t = Tensor::alloc(&ctx, &[2]);
        let bad = t.slice(&[3], &[4]);
        let worse = bad.permute(0, 0).contiguous();
        let messages = worse.failure().unwrap().messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("contiguous input"));
        assert!(messages[1].contains("permute input"));
        assert!(messages[2].contains("invalid range"));
    }

    #[test]
    fn test_view_allocation_failure() {
        let bounded = Rc::new(BoundedAllocator::new(5));
        let ctx = Context::builder().allocator(bounded.clone()).build();
        let t = Tensor::alloc(&ctx, &[2, 2]);
        assert!(!t.is_failed());
        let p = t.permute(0, 1);
        assert_eq!(p.failure_kind(), Some(ErrorKind::AllocationFailure));
        drop(p);
        assert_eq!(bounded.live_blocks(), 4);
    }
}
