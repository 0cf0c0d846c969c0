//! Operation engine: element-wise map, scalar broadcast and reduction.
//!
//! Every operation comes in two forms:
//!
//! - a **new** form taking a [`Context`] and returning a freshly allocated
//!   [`Tensor`] (failed if validation or allocation fails)
//! - an **into** form writing through a [`TensorIter`] over a caller-owned
//!   tensor, returning `Err(Failure)` when validation fails
//!
//! All traversal goes through the logical-order iterator, so inputs and
//! outputs may have any strides or offsets.
//!
//! # Available Operations
//!
//! - **Map:** [`map`], [`map_into`], [`binary`], [`add`], [`multiply`],
//!   [`maximum`], [`minimum`]
//!   - Left fold across two or more equally shaped inputs
//! - **Scalar broadcast:** [`vector_op`], [`vector_op_into`], [`vadd`], [`vmul`],
//!   [`vmax`], [`vmin`]
//!   - Each element becomes `op(scalar, element)`
//! - **Reduce:** [`reduce`], [`reduce_into`]
//!   - Fold along one axis, seeded with the first element of each fiber
//!
//! # Examples
//!
//! ```
//! use tenview_core::{ops, Context, Tensor};
//!
//! let ctx = Context::new();
//! let t = Tensor::range(&ctx, 0.0, 1.0, &[3, 4]);
//!
//! let sums = ops::reduce(&ctx, &t, 0, ops::scalar::add);
//! assert_eq!(sums.to_vec(), vec![12.0, 15.0, 18.0, 21.0]);
//!
//! let doubled = ops::vmul(&ctx, 2.0, &t);
//! let total = ops::add(&ctx, &t, &doubled);
//! assert_eq!(total.get(&[2, 3]).unwrap(), 33.0);
//! ```

use crate::context::Context;
use crate::dense::{Tensor, TensorIter, View};
use crate::error::TensorError;
use crate::failure::Failure;
use crate::pool::Provenance;
use crate::provenance;
use crate::types::IndexVec;
use smallvec::SmallVec;

/// Binary operations on elements
pub mod scalar {
    /// `a + b`
    pub fn add(a: f32, b: f32) -> f32 {
        a + b
    }

    /// `a * b`
    pub fn mul(a: f32, b: f32) -> f32 {
        a * b
    }

    /// Larger of `a` and `b`
    pub fn max(a: f32, b: f32) -> f32 {
        a.max(b)
    }

    /// Smaller of `a` and `b`
    pub fn min(a: f32, b: f32) -> f32 {
        a.min(b)
    }
}

/// Why an operation refused to run.
enum Rejection<'t> {
    FailedInput {
        tensor: &'t Tensor,
        name: &'static str,
    },
    Invalid(TensorError),
}

impl From<TensorError> for Rejection<'_> {
    fn from(err: TensorError) -> Self {
        Rejection::Invalid(err)
    }
}

impl Rejection<'_> {
    fn into_failure(self, ctx: &Context, prov: Provenance) -> Failure {
        match self {
            Rejection::FailedInput { tensor, name } => Failure::caused_by(
                ctx,
                tensor.failure(),
                &TensorError::InvalidTensor { name },
                prov,
            ),
            Rejection::Invalid(err) => {
                tracing::debug!(kind = %err.kind(), error = %err, "operation rejected");
                Failure::new(ctx, &err, prov)
            }
        }
    }

    fn into_tensor(self, ctx: &Context, prov: Provenance) -> Tensor {
        Tensor::from_failure(self.into_failure(ctx, prov))
    }
}

fn valid<'t>(tensor: &'t Tensor, name: &'static str) -> Result<&'t View, Rejection<'t>> {
    tensor
        .view()
        .map_err(|_| Rejection::FailedInput { tensor, name })
}

/// Validate map operands and return their common shape.
fn check_map<'t>(inputs: &[&'t Tensor]) -> Result<&'t [usize], Rejection<'t>> {
    if inputs.len() < 2 {
        return Err(TensorError::TooFewOperands {
            found: inputs.len(),
        }
        .into());
    }
    for &t in inputs {
        valid(t, "map input")?;
    }
    let shape = inputs[0].shape();
    for (k, t) in inputs.iter().enumerate().skip(1) {
        if t.shape() != shape {
            return Err(TensorError::shape_mismatch(
                format!("map input {k}"),
                shape,
                t.shape(),
            )
            .into());
        }
    }
    Ok(shape)
}

fn check_output<'t>(out: &'t Tensor, expected: &[usize], what: &str) -> Result<(), Rejection<'t>> {
    valid(out, "output")?;
    if out.shape() != expected {
        return Err(TensorError::shape_mismatch(what, expected, out.shape()).into());
    }
    Ok(())
}

fn map_values<F>(out: &mut TensorIter<'_>, op: &F, inputs: &[&Tensor])
where
    F: Fn(f32, f32) -> f32,
{
    let views: SmallVec<[&View; 4]> = inputs.iter().filter_map(|t| t.view_opt()).collect();
    out.reset();
    while out.advance() {
        let idx = out.index();
        let acc = views[1..]
            .iter()
            .fold(views[0].load(idx), |acc, v| op(acc, v.load(idx)));
        out.set(acc);
    }
}

/// Element-wise left fold across `inputs` into a new tensor.
///
/// Each output element is `op(op(op(t0, t1), t2), ...)`. Requires at least
/// two inputs of identical shape.
///
/// # Examples
///
/// ```
/// use tenview_core::{ops, Context, Tensor};
///
/// let ctx = Context::new();
/// let a = Tensor::create(&ctx, 8.0, &[2]);
/// let b = Tensor::create(&ctx, 2.0, &[2]);
/// let c = Tensor::create(&ctx, 1.0, &[2]);
///
/// // (8 - 2) - 1, not 8 - (2 - 1)
/// let r = ops::map(&ctx, |x, y| x - y, &[&a, &b, &c]);
/// assert_eq!(r.to_vec(), vec![5.0, 5.0]);
///
/// assert!(ops::map(&ctx, |x, y| x - y, &[&a]).is_failed());
/// ```
pub fn map<F>(ctx: &Context, op: F, inputs: &[&Tensor]) -> Tensor
where
    F: Fn(f32, f32) -> f32,
{
    let shape = match check_map(inputs) {
        Ok(shape) => shape,
        Err(rejection) => return rejection.into_tensor(ctx, provenance!("map")),
    };
    let out = Tensor::alloc(ctx, shape);
    if out.is_failed() {
        return out;
    }
    map_values(&mut out.iter(), &op, inputs);
    out
}

/// Element-wise left fold across `inputs`, written through `out`.
///
/// The iterator is rewound first; its tensor must have the inputs' shape.
pub fn map_into<F>(out: &mut TensorIter<'_>, op: F, inputs: &[&Tensor]) -> Result<(), Failure>
where
    F: Fn(f32, f32) -> f32,
{
    let target = out.tensor();
    check_map(inputs)
        .and_then(|shape| check_output(target, shape, "map output"))
        .map_err(|r| r.into_failure(target.context(), provenance!("map_into")))?;
    map_values(out, &op, inputs);
    Ok(())
}

/// `op` applied pairwise to two tensors
pub fn binary<F>(ctx: &Context, a: &Tensor, op: F, b: &Tensor) -> Tensor
where
    F: Fn(f32, f32) -> f32,
{
    map(ctx, op, &[a, b])
}

/// Element-wise sum
pub fn add(ctx: &Context, a: &Tensor, b: &Tensor) -> Tensor {
    map(ctx, scalar::add, &[a, b])
}

/// Element-wise product
pub fn multiply(ctx: &Context, a: &Tensor, b: &Tensor) -> Tensor {
    map(ctx, scalar::mul, &[a, b])
}

/// Element-wise maximum
pub fn maximum(ctx: &Context, a: &Tensor, b: &Tensor) -> Tensor {
    map(ctx, scalar::max, &[a, b])
}

/// Element-wise minimum
pub fn minimum(ctx: &Context, a: &Tensor, b: &Tensor) -> Tensor {
    map(ctx, scalar::min, &[a, b])
}

fn scalar_values<F>(out: &mut TensorIter<'_>, scalar: f32, op: &F, view: &View)
where
    F: Fn(f32, f32) -> f32,
{
    out.reset();
    while out.advance() {
        out.set(op(scalar, view.load(out.index())));
    }
}

/// New tensor with every element replaced by `op(scalar, element)`.
pub fn vector_op<F>(ctx: &Context, scalar: f32, op: F, tensor: &Tensor) -> Tensor
where
    F: Fn(f32, f32) -> f32,
{
    let view = match valid(tensor, "vector_op input") {
        Ok(view) => view,
        Err(rejection) => return rejection.into_tensor(ctx, provenance!("vector_op")),
    };
    let out = Tensor::alloc(ctx, tensor.shape());
    if out.is_failed() {
        return out;
    }
    scalar_values(&mut out.iter(), scalar, &op, view);
    out
}

/// Write `op(scalar, element)` for every element of `tensor` through `out`.
pub fn vector_op_into<F>(
    out: &mut TensorIter<'_>,
    scalar: f32,
    op: F,
    tensor: &Tensor,
) -> Result<(), Failure>
where
    F: Fn(f32, f32) -> f32,
{
    let target = out.tensor();
    let view = valid(tensor, "vector_op input")
        .and_then(|view| {
            check_output(target, tensor.shape(), "vector_op output")?;
            Ok(view)
        })
        .map_err(|r| r.into_failure(target.context(), provenance!("vector_op_into")))?;
    scalar_values(out, scalar, &op, view);
    Ok(())
}

/// `scalar + element` for every element
pub fn vadd(ctx: &Context, scalar: f32, tensor: &Tensor) -> Tensor {
    vector_op(ctx, scalar, scalar::add, tensor)
}

/// `scalar * element` for every element
pub fn vmul(ctx: &Context, scalar: f32, tensor: &Tensor) -> Tensor {
    vector_op(ctx, scalar, scalar::mul, tensor)
}

/// Larger of `scalar` and each element, e.g. a lower clamp
pub fn vmax(ctx: &Context, scalar: f32, tensor: &Tensor) -> Tensor {
    vector_op(ctx, scalar, scalar::max, tensor)
}

/// Smaller of `scalar` and each element
pub fn vmin(ctx: &Context, scalar: f32, tensor: &Tensor) -> Tensor {
    vector_op(ctx, scalar, scalar::min, tensor)
}

/// Validate a reduction; `out` is the caller-supplied output shape, if any.
fn check_reduce<'t>(
    tensor: &'t Tensor,
    axis: usize,
    out: Option<&[usize]>,
) -> Result<&'t View, Rejection<'t>> {
    let view = valid(tensor, "reduce input")?;
    let shape = &view.layout.shape;
    let ndim = shape.len();
    if ndim == 0 {
        return Err(TensorError::ScalarReduction.into());
    }
    if axis >= ndim {
        return Err(TensorError::out_of_range("axis", axis, ndim).into());
    }
    if let Some(out) = out {
        if out.len() != ndim - 1 {
            return Err(
                TensorError::shape_mismatch("reduce output rank", [ndim - 1], [out.len()]).into(),
            );
        }
    }
    if shape[axis] == 0 {
        return Err(TensorError::EmptyAxis { axis }.into());
    }
    if let Some(out) = out {
        let expected = shape.without(axis);
        if expected.as_slice() != out {
            return Err(TensorError::shape_mismatch("reduce output", expected, out).into());
        }
    }
    Ok(view)
}

fn reduce_values<F>(out: &mut TensorIter<'_>, view: &View, axis: usize, op: &F)
where
    F: Fn(f32, f32) -> f32,
{
    let extent = view.layout.shape[axis];
    let step = view.layout.stride[axis];
    let mut full = IndexVec::zeros(view.layout.shape.len());
    out.reset();
    while out.advance() {
        let kept = (0..full.len()).filter(|&d| d != axis);
        for (d, &i) in kept.zip(out.index().iter()) {
            full[d] = i;
        }
        full[axis] = 0;
        // fiber start includes this view's offset along `axis`
        let base = view.addr_of(&full);
        let acc = (1..extent).fold(view.storage.load(base), |acc, p| {
            op(acc, view.storage.load(base + p * step))
        });
        out.set(acc);
    }
}

/// Fold `tensor` along `axis` into a new tensor of rank `ndim - 1`.
///
/// Each fiber is folded left starting from its first element. Fails on
/// scalars, out-of-range axes and empty axes.
///
/// # Examples
///
/// ```
/// use tenview_core::{ops, Context, Tensor};
///
/// let ctx = Context::new();
/// let t = Tensor::from_slice(&ctx, &[1.0, 5.0, 3.0, 4.0, 2.0, 6.0], &[2, 3]);
/// let m = ops::reduce(&ctx, &t, 1, ops::scalar::max);
/// assert_eq!(m.shape(), &[2]);
/// assert_eq!(m.to_vec(), vec![5.0, 6.0]);
/// ```
pub fn reduce<F>(ctx: &Context, tensor: &Tensor, axis: usize, op: F) -> Tensor
where
    F: Fn(f32, f32) -> f32,
{
    let view = match check_reduce(tensor, axis, None) {
        Ok(view) => view,
        Err(rejection) => return rejection.into_tensor(ctx, provenance!("reduce")),
    };
    let out = Tensor::alloc(ctx, &view.layout.shape.without(axis));
    if out.is_failed() {
        return out;
    }
    reduce_values(&mut out.iter(), view, axis, &op);
    out
}

/// Fold `tensor` along `axis`, writing through `out`.
///
/// `out` must have rank `ndim - 1` and match `tensor` on every retained axis.
pub fn reduce_into<F>(
    out: &mut TensorIter<'_>,
    tensor: &Tensor,
    axis: usize,
    op: F,
) -> Result<(), Failure>
where
    F: Fn(f32, f32) -> f32,
{
    let target = out.tensor();
    let view = valid(target, "output")
        .and_then(|_| check_reduce(tensor, axis, Some(target.shape())))
        .map_err(|r| r.into_failure(target.context(), provenance!("reduce_into")))?;
    reduce_values(out, view, axis, &op);
    Ok(())
}
