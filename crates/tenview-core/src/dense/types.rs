//! Tensor type definition and basic accessors
//!
//! This module defines [`Tensor`], a strided view over shared `f32` storage,
//! together with its address computation. Construction, view derivation,
//! iteration and display live in sibling modules.

use crate::alloc::Lease;
use crate::context::Context;
use crate::error::{ErrorKind, TensorError, TensorResult};
use crate::failure::Failure;
use crate::pool::Provenance;
use crate::types::{row_major_strides, IndexVec};
use smallvec::SmallVec;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Flat element buffer shared by every view derived from one allocation.
pub(crate) struct Storage {
    cells: Box<[Cell<f32>]>,
    _lease: Option<Lease>,
}

impl Storage {
    /// Zero-filled buffer of `len` elements leased from the context allocator.
    ///
    /// The lease is the allocator's grant; the cells themselves come from
    /// the global heap and a refused reservation is reported the same way.
    pub(crate) fn zeroed(ctx: &Context, len: usize) -> TensorResult<Rc<Self>> {
        let lease = Lease::for_elems::<f32>(ctx.allocator(), len)?;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| TensorError::AllocationFailure {
                bytes: len.saturating_mul(std::mem::size_of::<f32>()),
            })?;
        cells.resize_with(len, || Cell::new(0.0));
        Ok(Rc::new(Self {
            cells: cells.into_boxed_slice(),
            _lease: lease,
        }))
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub(crate) fn load(&self, addr: usize) -> f32 {
        self.cells[addr].get()
    }

    #[inline]
    pub(crate) fn store(&self, addr: usize, value: f32) {
        self.cells[addr].set(value)
    }

    pub(crate) fn cells(&self) -> &[Cell<f32>] {
        &self.cells
    }
}

/// Shape, stride and offset of one view, each backed by its own lease.
pub(crate) struct Layout {
    pub(crate) shape: IndexVec,
    pub(crate) stride: IndexVec,
    pub(crate) offset: IndexVec,
    _leases: SmallVec<[Lease; 3]>,
}

impl Layout {
    /// Lease three metadata vectors and fill them.
    pub(crate) fn new(
        ctx: &Context,
        shape: IndexVec,
        stride: IndexVec,
        offset: IndexVec,
    ) -> TensorResult<Self> {
        debug_assert!(shape.len() == stride.len() && shape.len() == offset.len());
        let mut leases = SmallVec::new();
        for _ in 0..3 {
            if let Some(lease) = Lease::for_elems::<usize>(ctx.allocator(), shape.len())? {
                leases.push(lease);
            }
        }
        Ok(Self {
            shape,
            stride,
            offset,
            _leases: leases,
        })
    }

    /// Row-major layout with zero offsets.
    pub(crate) fn row_major(ctx: &Context, shape: IndexVec) -> TensorResult<Self> {
        let stride = row_major_strides(&shape);
        let offset = IndexVec::zeros(shape.len());
        Self::new(ctx, shape, stride, offset)
    }

    /// Fresh leases for a copy of this layout.
    pub(crate) fn duplicate(&self, ctx: &Context) -> TensorResult<Self> {
        Self::new(
            ctx,
            self.shape.clone(),
            self.stride.clone(),
            self.offset.clone(),
        )
    }
}

/// Storage handle plus layout of a valid tensor.
pub struct View {
    pub(crate) storage: Rc<Storage>,
    pub(crate) layout: Layout,
}

impl View {
    /// Storage address of `index` without bounds checks on the index.
    ///
    /// # Panics
    ///
    /// Panics if the address lands outside storage, which means the layout
    /// invariant was broken.
    #[inline]
    pub(crate) fn addr_of(&self, index: &[usize]) -> usize {
        let l = &self.layout;
        let addr: usize = index
            .iter()
            .zip(l.offset.iter().zip(l.stride.iter()))
            .map(|(&i, (&o, &s))| (o + i) * s)
            .sum();
        assert!(
            addr < self.storage.len(),
            "address {addr} outside storage of length {}",
            self.storage.len()
        );
        addr
    }

    #[inline]
    pub(crate) fn load(&self, index: &[usize]) -> f32 {
        self.storage.load(self.addr_of(index))
    }

    #[inline]
    pub(crate) fn store(&self, index: &[usize], value: f32) {
        self.storage.store(self.addr_of(index), value)
    }

    pub(crate) fn numel(&self) -> usize {
        self.layout.shape.iter().product()
    }
}

/// Ownership state of a tensor.
pub enum TensorState {
    /// Holds storage it allocated
    Owned(View),
    /// Aliases storage allocated by another tensor
    Borrowed(View),
    /// An operation failed; carries the diagnostic chain
    Failed(Failure),
}

/// Ownership marker reported by [`Tensor::ownership`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The tensor allocated its storage
    Owned,
    /// The tensor is a view on another tensor's storage
    Borrowed,
    /// The tensor carries a failure instead of data
    Failed,
}

/// Strided N-dimensional view over shared `f32` storage.
///
/// A tensor is either a valid view (owning or borrowing its storage) or a
/// failed result carrying a chain of diagnostics. Storage is shared between
/// views and interior-mutable: writing through any view is visible through
/// all others.
///
/// The element at `index` lives at `sum_i (offset[i] + index[i]) * stride[i]`.
///
/// # Examples
///
/// ```
/// use tenview_core::{Context, Tensor};
///
/// let ctx = Context::new();
/// let t = Tensor::create(&ctx, 1.0, &[2, 3]);
/// t.set(&[1, 2], 5.0).unwrap();
///
/// let p = t.permute(0, 1);
/// assert_eq!(p.shape(), &[3, 2]);
/// assert_eq!(p.get(&[2, 1]).unwrap(), 5.0);
/// assert!(p.shares_storage_with(&t));
/// ```
pub struct Tensor {
    pub(crate) ctx: Context,
    pub(crate) state: TensorState,
}

impl Tensor {
    pub(crate) fn owned(ctx: &Context, view: View) -> Self {
        Self {
            ctx: ctx.clone(),
            state: TensorState::Owned(view),
        }
    }

    pub(crate) fn borrowed(ctx: &Context, view: View) -> Self {
        Self {
            ctx: ctx.clone(),
            state: TensorState::Borrowed(view),
        }
    }

    pub(crate) fn from_failure(failure: Failure) -> Self {
        Self {
            ctx: failure.context().clone(),
            state: TensorState::Failed(failure),
        }
    }

    /// A failed tensor recording `err`.
    pub(crate) fn failed(ctx: &Context, err: TensorError, prov: Provenance) -> Self {
        tracing::debug!(kind = %err.kind(), error = %err, "tensor operation failed");
        Self::from_failure(Failure::new(ctx, &err, prov))
    }

    /// A failed tensor for an operation whose input `input` had already failed.
    pub(crate) fn failed_input(
        ctx: &Context,
        input: &Tensor,
        name: &'static str,
        prov: Provenance,
    ) -> Self {
        let err = TensorError::InvalidTensor { name };
        Self::from_failure(Failure::caused_by(ctx, input.failure(), &err, prov))
    }

    /// The valid view, or an [`InvalidTensor`](TensorError::InvalidTensor) error.
    pub(crate) fn view(&self) -> TensorResult<&View> {
        match &self.state {
            TensorState::Owned(v) | TensorState::Borrowed(v) => Ok(v),
            TensorState::Failed(_) => Err(TensorError::InvalidTensor { name: "tensor" }),
        }
    }

    pub(crate) fn view_opt(&self) -> Option<&View> {
        self.view().ok()
    }

    /// Context the tensor was created in
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Ownership state
    pub fn state(&self) -> &TensorState {
        &self.state
    }

    /// Whether this tensor is owned, a view, or failed
    pub fn ownership(&self) -> Ownership {
        match self.state {
            TensorState::Owned(_) => Ownership::Owned,
            TensorState::Borrowed(_) => Ownership::Borrowed,
            TensorState::Failed(_) => Ownership::Failed,
        }
    }

    /// Whether an operation failed producing this tensor
    pub fn is_failed(&self) -> bool {
        matches!(self.state, TensorState::Failed(_))
    }

    /// The failure, for failed tensors
    pub fn failure(&self) -> Option<&Failure> {
        match &self.state {
            TensorState::Failed(f) => Some(f),
            _ => None,
        }
    }

    /// Kind of the most recent error, for failed tensors
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.failure().map(Failure::kind)
    }

    /// Turn a failed tensor into an error.
    ///
    /// The oldest diagnostic is the root cause and each newer one is
    /// attached as context.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::range(&ctx, 0.0, 1.0, &[4]);
    /// let err = t.slice(&[3], &[2]).into_result().unwrap_err();
    /// assert!(err.to_string().contains("invalid range"));
    /// ```
    pub fn into_result(self) -> anyhow::Result<Tensor> {
        match &self.state {
            TensorState::Failed(f) => Err(f.to_anyhow()),
            _ => Ok(self),
        }
    }

    /// Number of dimensions; 0 for scalars and failed tensors
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Extent of each dimension
    pub fn shape(&self) -> &[usize] {
        self.view_opt().map_or(&[][..], |v| v.layout.shape.as_slice())
    }

    /// Storage step of each dimension
    pub fn stride(&self) -> &[usize] {
        self.view_opt().map_or(&[][..], |v| v.layout.stride.as_slice())
    }

    /// Base displacement of each dimension
    pub fn offset(&self) -> &[usize] {
        self.view_opt().map_or(&[][..], |v| v.layout.offset.as_slice())
    }

    /// Number of logical elements: product of the shape, 1 for scalars,
    /// 0 for failed tensors.
    pub fn numel(&self) -> usize {
        self.view_opt().map_or(0, View::numel)
    }

    /// Length of the underlying storage buffer
    pub fn storage_len(&self) -> usize {
        self.view_opt().map_or(0, |v| v.storage.len())
    }

    /// Whether this tensor allocated its storage
    pub fn owns_storage(&self) -> bool {
        matches!(self.state, TensorState::Owned(_))
    }

    /// Whether both tensors alias the same storage buffer
    pub fn shares_storage_with(&self, other: &Tensor) -> bool {
        match (self.view_opt(), other.view_opt()) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a.storage, &b.storage),
            _ => false,
        }
    }

    /// Whether the layout is row-major with zero offsets.
    ///
    /// ```
    /// use tenview_core::{Context, Tensor};
    ///
    /// let ctx = Context::new();
    /// let t = Tensor::alloc(&ctx, &[2, 3]);
    /// assert!(t.is_contiguous());
    /// assert!(!t.permute(0, 1).is_contiguous());
    /// assert!(t.permute(0, 1).contiguous().is_contiguous());
    /// ```
    pub fn is_contiguous(&self) -> bool {
        match self.view_opt() {
            Some(v) => {
                v.layout.offset.iter().all(|&o| o == 0)
                    && v.layout.stride == row_major_strides(&v.layout.shape)
            }
            None => false,
        }
    }

    /// Storage address of `index`.
    ///
    /// # Errors
    ///
    /// - [`TensorError::ShapeMismatch`] if `index` has the wrong length
    /// - [`TensorError::IndexOutOfRange`] if any component exceeds its extent
    /// - [`TensorError::InvalidTensor`] for a failed tensor
    ///
    /// # Panics
    ///
    /// Panics if a validated index maps outside storage.
    pub fn addr(&self, index: &[usize]) -> TensorResult<usize> {
        let view = self.view()?;
        let shape = &view.layout.shape;
        if index.len() != shape.len() {
            return Err(TensorError::shape_mismatch(
                "index length",
                [shape.len()],
                [index.len()],
            ));
        }
        for (&i, &extent) in index.iter().zip(shape.iter()) {
            if i >= extent {
                return Err(TensorError::out_of_range("index", i, extent));
            }
        }
        Ok(view.addr_of(index))
    }

    /// Read the element at `index`
    pub fn get(&self, index: &[usize]) -> TensorResult<f32> {
        let addr = self.addr(index)?;
        Ok(self.view()?.storage.load(addr))
    }

    /// Write the element at `index`; visible through every alias.
    pub fn set(&self, index: &[usize], value: f32) -> TensorResult<()> {
        let addr = self.addr(index)?;
        self.view()?.storage.store(addr, value);
        Ok(())
    }

    /// Elements in logical (last dimension fastest) order.
    pub fn to_vec(&self) -> Vec<f32> {
        match self.view_opt() {
            Some(view) => self.iter().map(|idx| view.load(&idx)).collect(),
            None => Vec::new(),
        }
    }

    /// Raw storage contents in physical order.
    pub fn storage_to_vec(&self) -> Vec<f32> {
        self.view_opt()
            .map(|v| v.storage.cells().iter().map(Cell::get).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            TensorState::Failed(failure) => f
                .debug_struct("Tensor")
                .field("failure", failure)
                .finish(),
            TensorState::Owned(v) | TensorState::Borrowed(v) => f
                .debug_struct("Tensor")
                .field("ownership", &self.ownership())
                .field("shape", &v.layout.shape)
                .field("stride", &v.layout.stride)
                .field("offset", &v.layout.offset)
                .field("storage_len", &v.storage.len())
                .finish(),
        }
    }
}
