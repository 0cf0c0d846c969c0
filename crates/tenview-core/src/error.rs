//! Error types for tensor operations
//!
//! Direct calls (element access, in-place permutation) return
//! [`TensorError`]. Tensor-producing operations instead return a failed
//! [`Tensor`](crate::Tensor) whose diagnostic text lives in the
//! [`ErrorPool`](crate::ErrorPool); every record there is tagged with an
//! [`ErrorKind`].

use crate::types::IndexVec;
use std::fmt;
use thiserror::Error;

/// Failure taxonomy shared by [`TensorError`] and pool records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// The allocator capability refused a request
    AllocationFailure,
    /// Dimension-count or extent mismatch between operands
    ShapeMismatch,
    /// An index or axis exceeds its declared extent
    IndexOutOfRange,
    /// Slice bounds violate ordering or extent
    InvalidRange,
    /// The diagnostic pool has no capacity and nothing to reclaim
    PoolExhausted,
    /// A failed tensor was used as an operand
    InvalidTensor,
}

impl ErrorKind {
    /// Stable lowercase name, used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::AllocationFailure => "allocation_failure",
            ErrorKind::ShapeMismatch => "shape_mismatch",
            ErrorKind::IndexOutOfRange => "index_out_of_range",
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::PoolExhausted => "pool_exhausted",
            ErrorKind::InvalidTensor => "invalid_tensor",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for tensor operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// The allocator returned nothing for a request of `bytes`
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailure { bytes: usize },

    /// Operand shapes or ranks disagree
    #[error("{context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: IndexVec,
        found: IndexVec,
    },

    /// Element-wise map called with fewer than two operands
    #[error("element-wise map needs at least 2 tensors, found {found}")]
    TooFewOperands { found: usize },

    /// Reduction over a 0-dimensional tensor
    #[error("reduction attempted on a 0 dimensional tensor")]
    ScalarReduction,

    /// Reduction along an axis with no elements
    #[error("expected at least 1 element in dimension {axis} of input tensor, found none")]
    EmptyAxis { axis: usize },

    /// An index or axis is not below its bound
    #[error("{what} {index} is out of range for extent {bound}")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    /// Slice bounds are out of order or exceed the extent
    #[error("invalid range [{start}, {end}) on axis {axis} with extent {extent}")]
    InvalidRange {
        axis: usize,
        start: usize,
        end: usize,
        extent: usize,
    },

    /// No diagnostic record could be produced
    #[error("error pool exhausted: no free units and no record to reclaim")]
    PoolExhausted,

    /// A failed tensor was used where a valid one is required
    #[error("tried to use invalid tensor `{name}`")]
    InvalidTensor { name: &'static str },
}

impl TensorError {
    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TensorError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            TensorError::ShapeMismatch { .. }
            | TensorError::TooFewOperands { .. }
            | TensorError::ScalarReduction
            | TensorError::EmptyAxis { .. } => ErrorKind::ShapeMismatch,
            TensorError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            TensorError::InvalidRange { .. } => ErrorKind::InvalidRange,
            TensorError::PoolExhausted => ErrorKind::PoolExhausted,
            TensorError::InvalidTensor { .. } => ErrorKind::InvalidTensor,
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl Into<IndexVec>,
        found: impl Into<IndexVec>,
    ) -> Self {
        TensorError::ShapeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an index out of range error
    pub fn out_of_range(what: &'static str, index: usize, bound: usize) -> Self {
        TensorError::IndexOutOfRange { what, index, bound }
    }
}

/// Result type for direct tensor calls
pub type TensorResult<T> = Result<T, TensorError>;
