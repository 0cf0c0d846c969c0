//! Shape vector utilities shared by tensor views and the error pool.
//!
//! This module defines the small integer sequences every tensor carries:
//!
//! - Type aliases for dimensions ([`Axis`], [`Rank`], [`Shape`])
//! - [`IndexVec`], the fixed-length sequence used for shape, stride, offset
//!   and iterator cursors, with equality and `(a, b, c)` pretty-printing
//! - [`row_major_strides`], the canonical C-order stride rule
//!
//! # Examples
//!
//! ```
//! use tenview_core::{row_major_strides, IndexVec};
//!
//! let shape = IndexVec::new(&[2, 3, 4]);
//! assert_eq!(row_major_strides(&shape).as_slice(), &[12, 4, 1]);
//! assert_eq!(shape.to_string(), "(2, 3, 4)");
//! ```

use smallvec::SmallVec;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Type alias for a tensor axis index (zero-based).
pub type Axis = usize;

/// Type alias for tensor rank (number of dimensions).
///
/// A rank of 0 denotes a scalar stored at `storage[0]`.
pub type Rank = usize;

/// Inline storage for shape-like sequences.
///
/// Optimized for tensors with up to 6 dimensions; higher ranks spill to the heap.
pub type Shape = SmallVec<[usize; 6]>;

/// An ordered, fixed-length sequence of non-negative integers.
///
/// One instance each holds a view's shape, stride and offset; all three
/// always have the view's rank as length.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexVec(Shape);

impl IndexVec {
    /// Create an index vector by copying `values`.
    pub fn new(values: &[usize]) -> Self {
        Self(Shape::from_slice(values))
    }

    /// Create an all-zero index vector of length `len`.
    pub fn zeros(len: usize) -> Self {
        Self(smallvec::smallvec![0; len])
    }

    /// Borrow the values as a slice.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Borrow the values as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [usize] {
        &mut self.0
    }

    /// Product of all entries; 1 for an empty vector.
    ///
    /// Returns `None` on overflow.
    pub fn checked_product(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Copy of `self` with the entry at `axis` removed.
    pub fn without(&self, axis: Axis) -> Self {
        Self(
            self.0
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != axis)
                .map(|(_, &d)| d)
                .collect(),
        )
    }
}

impl Deref for IndexVec {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl DerefMut for IndexVec {
    fn deref_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

impl From<&[usize]> for IndexVec {
    fn from(values: &[usize]) -> Self {
        Self::new(values)
    }
}

impl From<Vec<usize>> for IndexVec {
    fn from(values: Vec<usize>) -> Self {
        Self(Shape::from_vec(values))
    }
}

impl<const N: usize> From<[usize; N]> for IndexVec {
    fn from(values: [usize; N]) -> Self {
        Self::new(&values)
    }
}

impl PartialEq<[usize]> for IndexVec {
    fn eq(&self, other: &[usize]) -> bool {
        self.as_slice() == other
    }
}

impl fmt::Display for IndexVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for IndexVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Row-major (C order) strides for `shape`.
///
/// The last dimension gets stride 1 and `stride[i] = stride[i + 1] * shape[i + 1]`.
///
/// # Examples
///
/// ```
/// use tenview_core::row_major_strides;
///
/// assert_eq!(row_major_strides(&[2, 3]).as_slice(), &[3, 1]);
/// assert!(row_major_strides(&[]).is_empty());
/// ```
pub fn row_major_strides(shape: &[usize]) -> IndexVec {
    let mut strides = IndexVec::zeros(shape.len());
    let mut step = 1usize;
    for i in (0..shape.len()).rev() {
        strides[i] = step;
        step = step.saturating_mul(shape[i]);
    }
    strides
}
