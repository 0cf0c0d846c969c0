//! Strided tensor views and their operations
//!
//! This module is organized into functional sub-modules:
//! the core type and address computation, constructors, view derivation,
//! logical-order iteration and text rendering.

// Core type definition
pub mod types;

// Operation modules
mod creation;
mod display;
pub mod iter;
mod views;

pub use iter::TensorIter;
pub use types::{Ownership, Tensor, TensorState, View};
