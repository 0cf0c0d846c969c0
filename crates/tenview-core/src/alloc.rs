//! Allocator capability used for every heap-backed tensor buffer
//!
//! Tensors never reach for the heap on their own: each storage buffer and
//! each metadata vector first obtains a [`Block`] grant from an
//! [`Allocator`], and returns it exactly once when the buffer is dropped.
//!
//! ## Provided allocators
//!
//! - [`SystemAllocator`]: grants every request and keeps live statistics
//! - [`BoundedAllocator`]: refuses requests once a number of live blocks is
//!   reached, which makes allocation-failure paths reproducible in tests
//!
//! ## Usage
//!
//! ```
//! use std::rc::Rc;
//! use tenview_core::{BoundedAllocator, Context, Tensor};
//!
//! // Storage plus two metadata vectors fit, the third vector does not.
//! let allocator = Rc::new(BoundedAllocator::new(3));
//! let ctx = Context::builder().allocator(allocator.clone()).build();
//!
//! let t = Tensor::alloc(&ctx, &[2, 3]);
//! assert!(t.is_failed());
//! assert_eq!(allocator.live_blocks(), 0);
//! ```

use crate::error::TensorError;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// A grant for one heap region handed out by an [`Allocator`].
///
/// A block is an accounting record: it authorizes a buffer of `size` bytes,
/// while the bytes themselves are reserved from the global heap by the
/// tensor that holds the grant.
#[derive(Debug, PartialEq, Eq)]
pub struct Block {
    id: u64,
    size: usize,
    align: usize,
}

impl Block {
    /// Describe a granted region. Allocator implementations call this.
    pub fn new(id: u64, size: usize, align: usize) -> Self {
        Self { id, size, align }
    }

    /// Allocator-assigned identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment in bytes
    pub fn align(&self) -> usize {
        self.align
    }
}

/// Capability object through which all owned buffers are obtained.
///
/// `allocate` returns `None` when the request cannot be satisfied; callers
/// turn that into an [`ErrorKind::AllocationFailure`](crate::ErrorKind).
/// Every granted block is passed back to `release` exactly once.
pub trait Allocator {
    /// Request `size` bytes aligned to `align`.
    fn allocate(&self, size: usize, align: usize) -> Option<Block>;

    /// Return a block obtained from `allocate`.
    fn release(&self, block: Block);
}

/// Allocator that grants every request and tracks live usage.
///
/// No memory is reserved here. Oversized requests are still refused later,
/// when the tensor reserves its buffer from the global heap.
#[derive(Debug, Default)]
pub struct SystemAllocator {
    next_id: Cell<u64>,
    live_blocks: Cell<usize>,
    live_bytes: Cell<usize>,
}

impl SystemAllocator {
    /// Create a new system allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks granted and not yet released
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.get()
    }

    /// Bytes granted and not yet released
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize, align: usize) -> Option<Block> {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));
        self.live_blocks.set(self.live_blocks.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + size);
        Some(Block::new(id, size, align))
    }

    fn release(&self, block: Block) {
        self.live_blocks.set(self.live_blocks.get().saturating_sub(1));
        self.live_bytes
            .set(self.live_bytes.get().saturating_sub(block.size()));
    }
}

/// Allocator allowing at most `max_live` blocks to be outstanding at a time.
pub struct BoundedAllocator<A = SystemAllocator> {
    inner: A,
    max_live: Cell<usize>,
    live: Cell<usize>,
    refused: Cell<usize>,
}

impl BoundedAllocator<SystemAllocator> {
    /// Bound a fresh [`SystemAllocator`]
    pub fn new(max_live: usize) -> Self {
        Self::with_inner(SystemAllocator::new(), max_live)
    }
}

impl<A: Allocator> BoundedAllocator<A> {
    /// Bound an existing allocator
    pub fn with_inner(inner: A, max_live: usize) -> Self {
        Self {
            inner,
            max_live: Cell::new(max_live),
            live: Cell::new(0),
            refused: Cell::new(0),
        }
    }

    /// Blocks currently outstanding
    pub fn live_blocks(&self) -> usize {
        self.live.get()
    }

    /// Requests refused so far
    pub fn refused(&self) -> usize {
        self.refused.get()
    }

    /// Change the bound; blocks already granted stay valid.
    pub fn set_max_live(&self, max_live: usize) {
        self.max_live.set(max_live);
    }
}

impl<A: Allocator> Allocator for BoundedAllocator<A> {
    fn allocate(&self, size: usize, align: usize) -> Option<Block> {
        if self.live.get() >= self.max_live.get() {
            self.refused.set(self.refused.get() + 1);
            tracing::debug!(size, align, max_live = self.max_live.get(), "allocation refused");
            return None;
        }
        let block = self.inner.allocate(size, align)?;
        self.live.set(self.live.get() + 1);
        Some(block)
    }

    fn release(&self, block: Block) {
        self.live.set(self.live.get().saturating_sub(1));
        self.inner.release(block);
    }
}

impl<A> fmt::Debug for BoundedAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedAllocator")
            .field("max_live", &self.max_live.get())
            .field("live", &self.live.get())
            .field("refused", &self.refused.get())
            .finish()
    }
}

/// A granted block tied to the allocator that must take it back.
pub(crate) struct Lease {
    allocator: Rc<dyn Allocator>,
    block: Option<Block>,
}

impl Lease {
    /// Lease room for `count` values of `T`.
    ///
    /// Zero-byte requests are not sent to the allocator and yield `Ok(None)`.
    pub(crate) fn for_elems<T>(
        allocator: &Rc<dyn Allocator>,
        count: usize,
    ) -> Result<Option<Lease>, TensorError> {
        let bytes = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(TensorError::AllocationFailure { bytes: usize::MAX })?;
        // no Rust allocation may exceed isize::MAX bytes
        if bytes > isize::MAX as usize {
            return Err(TensorError::AllocationFailure { bytes });
        }
        if bytes == 0 {
            return Ok(None);
        }
        match allocator.allocate(bytes, std::mem::align_of::<T>()) {
            Some(block) => Ok(Some(Lease {
                allocator: Rc::clone(allocator),
                block: Some(block),
            })),
            None => Err(TensorError::AllocationFailure { bytes }),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.allocator.release(block);
        }
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lease").field(&self.block).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocator_tracks_live_usage() {
        let alloc = SystemAllocator::new();
        let a = alloc.allocate(64, 8).unwrap();
        let b = alloc.allocate(16, 4).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(alloc.live_blocks(), 2);
        assert_eq!(alloc.live_bytes(), 80);

        alloc.release(a);
        assert_eq!(alloc.live_blocks(), 1);
        assert_eq!(alloc.live_bytes(), 16);
        alloc.release(b);
        assert_eq!(alloc.live_bytes(), 0);
    }

    #[test]
    fn test_bounded_allocator_refuses_past_limit() {
        let alloc = BoundedAllocator::new(1);
        let first = alloc.allocate(8, 8).unwrap();
        assert!(alloc.allocate(8, 8).is_none());
        assert_eq!(alloc.refused(), 1);

        alloc.release(first);
        assert!(alloc.allocate(8, 8).is_some());
    }

    #[test]
    fn test_bound_adjustable_through_shared_handle() {
        let bounded = Rc::new(BoundedAllocator::new(0));
        let handle: Rc<dyn Allocator> = bounded.clone();
        assert!(Lease::for_elems::<f32>(&handle, 4).is_err());

        bounded.set_max_live(1);
        let lease = Lease::for_elems::<f32>(&handle, 4).unwrap();
        assert!(lease.is_some());
        assert_eq!(bounded.live_blocks(), 1);
    }

    #[test]
    fn test_lease_rejects_more_than_isize_max_bytes() {
        let system = Rc::new(SystemAllocator::new());
        let handle: Rc<dyn Allocator> = system.clone();
        let count = isize::MAX as usize / std::mem::size_of::<f32>() + 1;
        let err = Lease::for_elems::<f32>(&handle, count).unwrap_err();
        assert!(matches!(err, TensorError::AllocationFailure { .. }));
        assert_eq!(system.live_blocks(), 0);
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let system = Rc::new(SystemAllocator::new());
        let handle: Rc<dyn Allocator> = system.clone();
        {
            let lease = Lease::for_elems::<f32>(&handle, 10).unwrap();
            assert!(lease.is_some());
            assert_eq!(system.live_bytes(), 40);
        }
        assert_eq!(system.live_blocks(), 0);
    }

    #[test]
    fn test_zero_length_lease_skips_allocator() {
        let bounded = Rc::new(BoundedAllocator::new(0));
        let handle: Rc<dyn Allocator> = bounded.clone();
        assert!(Lease::for_elems::<usize>(&handle, 0).unwrap().is_none());
        assert_eq!(bounded.refused(), 0);

        let err = Lease::for_elems::<usize>(&handle, 2).unwrap_err();
        assert_eq!(
            err,
            TensorError::AllocationFailure {
                bytes: 2 * std::mem::size_of::<usize>()
            }
        );
    }
}
