//! Logical-order iteration over tensor indices

use super::types::{Tensor, View};
use crate::types::IndexVec;

/// Cursor over every logical index of a tensor, last dimension fastest.
///
/// The order depends only on the shape, never on strides. A scalar yields
/// one empty index; failed and zero-size tensors yield none. The cursor is
/// single-pass; call [`reset`](TensorIter::reset) to start over.
///
/// # Examples
///
/// ```
/// use tenview_core::{Context, Tensor};
///
/// let ctx = Context::new();
/// let t = Tensor::range(&ctx, 0.0, 1.0, &[2, 2]);
/// let mut it = t.iter();
/// let mut seen = Vec::new();
/// while it.advance() {
///     seen.push(it.index().to_vec());
/// }
/// assert_eq!(seen, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
/// ```
#[derive(Debug)]
pub struct TensorIter<'a> {
    tensor: &'a Tensor,
    cursor: IndexVec,
    started: bool,
    done: bool,
}

impl<'a> TensorIter<'a> {
    /// Start a fresh cursor over `tensor`
    pub fn new(tensor: &'a Tensor) -> Self {
        Self {
            tensor,
            cursor: IndexVec::zeros(tensor.ndim()),
            started: false,
            done: false,
        }
    }

    /// Move to the next index; `false` once every index has been produced.
    pub fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        if !self.started {
            self.started = true;
            if self.tensor.is_failed() || self.tensor.numel() == 0 {
                self.done = true;
                return false;
            }
            return true;
        }
        let shape = self.tensor.shape();
        for axis in (0..self.cursor.len()).rev() {
            self.cursor[axis] += 1;
            if self.cursor[axis] < shape[axis] {
                return true;
            }
            self.cursor[axis] = 0;
        }
        self.done = true;
        false
    }

    /// Current index
    pub fn index(&self) -> &IndexVec {
        &self.cursor
    }

    /// The tensor being traversed
    pub fn tensor(&self) -> &'a Tensor {
        self.tensor
    }

    /// Value at the current index.
    ///
    /// # Panics
    ///
    /// Panics if called before [`advance`](TensorIter::advance) returned `true`.
    pub fn get(&self) -> f32 {
        self.value_at_cursor(|view, idx| view.load(idx))
    }

    /// Write `value` at the current index.
    ///
    /// # Panics
    ///
    /// Panics if called before [`advance`](TensorIter::advance) returned `true`.
    pub fn set(&self, value: f32) {
        self.value_at_cursor(|view, idx| view.store(idx, value))
    }

    fn value_at_cursor<R>(&self, f: impl FnOnce(&View, &[usize]) -> R) -> R {
        assert!(self.started && !self.done, "iterator is not positioned on an element");
        match self.tensor.view_opt() {
            Some(view) => f(view, &self.cursor),
            None => unreachable!("failed tensors never yield a position"),
        }
    }

    /// Rewind to before the first index
    pub fn reset(&mut self) {
        self.cursor.iter_mut().for_each(|c| *c = 0);
        self.started = false;
        self.done = false;
    }
}

impl Iterator for TensorIter<'_> {
    type Item = IndexVec;

    fn next(&mut self) -> Option<IndexVec> {
        if self.advance() {
            Some(self.cursor.clone())
        } else {
            None
        }
    }
}

impl Tensor {
    /// Iterate over every logical index in row-major order
    pub fn iter(&self) -> TensorIter<'_> {
        TensorIter::new(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Context, Tensor};

    #[test]
    fn test_scalar_yields_once() {
        let ctx = Context::new();
        let s = Tensor::create(&ctx, 1.0, &[]);
        let mut it = s.iter();
        assert!(it.advance());
        assert!(it.index().is_empty());
        assert!(!it.advance());
        assert!(!it.advance());
    }

    #[test]
    fn test_order_ignores_strides() {
        let ctx = Context::new();
        let t = Tensor::alloc(&ctx, &[2, 3]);
        let p = t.permute(0, 1);
        let order: Vec<Vec<usize>> = p.iter().map(|i| i.to_vec()).collect();
        assert_eq!(order.len(), 6);
        assert_eq!(order[0], vec![0, 0]);
        assert_eq!(order[1], vec![0, 1]);
        assert_eq!(order[2], vec![1, 0]);
        assert_eq!(order[5], vec![2, 1]);
    }

    #[test]
    fn test_zero_size_and_failed_yield_nothing() {
        let ctx = Context::new();
        assert_eq!(Tensor::alloc(&ctx, &[3, 0, 2]).iter().count(), 0);
        assert_eq!(Tensor::alloc(&ctx, &[2]).permute(0, 5).iter().count(), 0);
    }

    #[test]
    fn test_get_set_and_reset() {
        let ctx = Context::new();
        let t = Tensor::alloc(&ctx, &[3]);
        let mut it = t.iter();
        let mut k = 0.0;
        while it.advance() {
            it.set(k);
            k += 1.0;
        }
        it.reset();
        assert!(it.advance());
        assert_eq!(it.get(), 0.0);
        assert!(it.advance());
        assert_eq!(it.get(), 1.0);
        assert_eq!(t.to_vec(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "not positioned")]
    fn test_get_before_advance_panics() {
        let ctx = Context::new();
        let t = Tensor::alloc(&ctx, &[2]);
        t.iter().get();
    }
}
