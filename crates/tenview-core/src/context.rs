//! Shared handle to the collaborators every tensor operation needs
//!
//! A [`Context`] bundles the [`Allocator`] capability, the [`ErrorPool`] and
//! the uniform random source. Cloning a context is cheap; all clones share
//! the same pool and allocator.

use crate::alloc::{Allocator, SystemAllocator};
use crate::pool::{ErrorPool, PoolConfig};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Source of uniformly distributed values for [`Tensor::random`](crate::Tensor::random).
pub trait UniformSource {
    /// A value in `[min, max)`.
    fn uniform(&mut self, min: f32, max: f32) -> f32;
}

impl<F> UniformSource for F
where
    F: FnMut(f32, f32) -> f32,
{
    fn uniform(&mut self, min: f32, max: f32) -> f32 {
        self(min, max)
    }
}

/// Default uniform source backed by the SciRS2 random utilities.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScirsUniform;

impl UniformSource for ScirsUniform {
    fn uniform(&mut self, min: f32, max: f32) -> f32 {
        let u = scirs2_core::random::quick::random_f64() as f32;
        min + u * (max - min)
    }
}

struct Inner {
    allocator: Rc<dyn Allocator>,
    pool: RefCell<ErrorPool>,
    uniform: RefCell<Box<dyn UniformSource>>,
}

/// Cheap, clonable handle to allocator, error pool and random source.
///
/// # Examples
///
/// ```
/// use tenview_core::{Context, ExhaustionPolicy, PoolConfig, Tensor};
///
/// let ctx = Context::builder()
///     .pool_config(PoolConfig::new(64).policy(ExhaustionPolicy::Fail))
///     .uniform_source(|min: f32, _max: f32| min)
///     .build();
///
/// let t = Tensor::random(&ctx, 2.0, 3.0, &[2, 2]);
/// assert_eq!(t.to_vec(), vec![2.0; 4]);
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Rc<Inner>,
}

impl Context {
    /// Context with the system allocator, a pool configured from the
    /// environment and the default random source.
    pub fn new() -> Self {
        Self::builder().pool_config(PoolConfig::from_env()).build()
    }

    /// Start building a customized context
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// The allocator capability
    pub fn allocator(&self) -> &Rc<dyn Allocator> {
        &self.inner.allocator
    }

    /// Borrow the error pool.
    ///
    /// # Panics
    ///
    /// Panics if the pool is currently borrowed mutably.
    pub fn pool(&self) -> Ref<'_, ErrorPool> {
        self.inner.pool.borrow()
    }

    pub(crate) fn pool_mut(&self) -> RefMut<'_, ErrorPool> {
        self.inner.pool.borrow_mut()
    }

    pub(crate) fn try_pool_mut(&self) -> Option<RefMut<'_, ErrorPool>> {
        self.inner.pool.try_borrow_mut().ok()
    }

    pub(crate) fn uniform(&self, min: f32, max: f32) -> f32 {
        self.inner.uniform.borrow_mut().uniform(min, max)
    }

    /// Whether both handles refer to the same context
    pub fn same_as(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Context");
        match self.inner.pool.try_borrow() {
            Ok(pool) => s.field("pool", &*pool),
            Err(_) => s.field("pool", &"<borrowed>"),
        };
        s.finish_non_exhaustive()
    }
}

/// Builder for [`Context`]
#[derive(Default)]
pub struct ContextBuilder {
    allocator: Option<Rc<dyn Allocator>>,
    pool: Option<PoolConfig>,
    uniform: Option<Box<dyn UniformSource>>,
}

impl ContextBuilder {
    /// Use `allocator` for all tensor buffers
    pub fn allocator(mut self, allocator: Rc<dyn Allocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Size and policy of the error pool
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool = Some(config);
        self
    }

    /// Replace the random source
    pub fn uniform_source(mut self, source: impl UniformSource + 'static) -> Self {
        self.uniform = Some(Box::new(source));
        self
    }

    /// Finish the context; unset parts take their defaults.
    pub fn build(self) -> Context {
        let allocator = self
            .allocator
            .unwrap_or_else(|| Rc::new(SystemAllocator::new()));
        let pool = ErrorPool::new(self.pool.unwrap_or_default());
        let uniform = self
            .uniform
            .unwrap_or_else(|| Box::new(ScirsUniform) as Box<dyn UniformSource>);
        Context {
            inner: Rc::new(Inner {
                allocator,
                pool: RefCell::new(pool),
                uniform: RefCell::new(uniform),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_pool() {
        let ctx = Context::builder().pool_config(PoolConfig::new(8)).build();
        let other = ctx.clone();
        assert!(ctx.same_as(&other));
        assert_eq!(other.pool().capacity_units(), 8);
        assert!(!ctx.same_as(&Context::builder().build()));
    }

    #[test]
    fn test_closure_uniform_source() {
        let mut calls = 0;
        let ctx = Context::builder()
            .uniform_source(move |min: f32, max: f32| {
                calls += 1;
                (min + max) / 2.0 + calls as f32
            })
            .build();
        assert_eq!(ctx.uniform(0.0, 2.0), 2.0);
        assert_eq!(ctx.uniform(0.0, 2.0), 3.0);
    }

    #[test]
    fn test_default_uniform_stays_in_range() {
        let ctx = Context::builder().build();
        for _ in 0..100 {
            let v = ctx.uniform(-1.0, 1.0);
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
