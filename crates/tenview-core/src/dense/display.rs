//! Text rendering of tensors

use super::types::{Tensor, TensorState};
use std::fmt;

/// Nested brackets in logical order, one innermost row per line.
///
/// ```
/// use tenview_core::{Context, Tensor};
///
/// let ctx = Context::new();
/// let t = Tensor::range(&ctx, 0.0, 1.0, &[2, 2]);
/// assert_eq!(
///     t.to_string(),
///     "[[0.000000, 1.000000]\n [2.000000, 3.000000]]\n"
/// );
/// ```
impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = match &self.state {
            TensorState::Failed(failure) => {
                writeln!(f, "Invalid tensor...")?;
                return write!(f, "{failure}");
            }
            TensorState::Owned(view) | TensorState::Borrowed(view) => view,
        };
        let shape = &view.layout.shape;
        let ndim = shape.len();
        if ndim == 0 {
            return writeln!(f, "{:.6}", view.load(&[]));
        }
        if view.numel() == 0 {
            return writeln!(f, "{}{}", "[".repeat(ndim), "]".repeat(ndim));
        }

        for idx in self.iter() {
            let opening = idx.iter().rev().take_while(|&&i| i == 0).count();
            if opening > 0 {
                write!(f, "{}{}", " ".repeat(ndim - opening), "[".repeat(opening))?;
            } else {
                f.write_str(", ")?;
            }
            write!(f, "{:.6}", view.load(&idx))?;

            let closing = idx
                .iter()
                .zip(shape.iter())
                .rev()
                .take_while(|&(&i, &extent)| i + 1 == extent)
                .count();
            if closing > 0 {
                writeln!(f, "{}", "]".repeat(closing))?;
            }
        }
        Ok(())
    }
}
