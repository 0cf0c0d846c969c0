//! The failed state of a tensor
//!
//! A [`Failure`] owns one link on the head of an error chain stored in its
//! context's [`ErrorPool`](crate::ErrorPool) and gives it back when dropped.

use crate::context::Context;
use crate::error::{ErrorKind, TensorError};
use crate::pool::{ErrorRef, Provenance};
use std::fmt;

/// Tag and diagnostic chain of a failed tensor operation.
pub struct Failure {
    ctx: Context,
    kind: ErrorKind,
    record: Option<ErrorRef>,
}

impl Failure {
    /// Record `err` as the start of a new chain.
    pub(crate) fn new(ctx: &Context, err: &TensorError, prov: Provenance) -> Self {
        Self::caused_by(ctx, None, err, prov)
    }

    /// Record `err` with `cause` as its prior failure.
    ///
    /// The cause only joins the chain when it lives in the same pool.
    pub(crate) fn caused_by(
        ctx: &Context,
        cause: Option<&Failure>,
        err: &TensorError,
        prov: Provenance,
    ) -> Self {
        let prior = cause
            .filter(|c| c.ctx.same_as(ctx))
            .and_then(|c| c.record);
        let kind = err.kind();
        let record = match ctx
            .pool_mut()
            .new_error(prior, kind, prov, format_args!("{err}"))
        {
            Ok(record) => Some(record),
            Err(pool_err) => {
                tracing::warn!(%kind, error = %pool_err, "could not record tensor failure");
                None
            }
        };
        Self {
            ctx: ctx.clone(),
            kind,
            record,
        }
    }

    /// Extend this chain with `err`, handing over this failure's link.
    pub fn wrap(self, err: &TensorError, prov: Provenance) -> Self {
        let ctx = self.ctx.clone();
        Self::caused_by(&ctx, Some(&self), err, prov)
    }

    /// Taxonomy tag of the most recent error
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Head of the chain in the pool, if one could be recorded
    pub fn record(&self) -> Option<ErrorRef> {
        self.record
    }

    /// Context whose pool holds the chain
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Messages of the chain, most recent first.
    ///
    /// A failure whose record could not be stored, or was later reclaimed
    /// by the pool, reports a single line naming its kind.
    pub fn messages(&self) -> Vec<String> {
        let Some(record) = self.record else {
            return vec![format!("{} (diagnostic not recorded)", self.kind)];
        };
        let messages: Vec<String> = self
            .ctx
            .pool()
            .chain(record)
            .map(|link| link.message.to_owned())
            .collect();
        if messages.is_empty() {
            return vec![format!("{} (diagnostic reclaimed)", self.kind)];
        }
        messages
    }

    /// Convert into an error whose root cause is the oldest record.
    pub fn to_anyhow(&self) -> anyhow::Error {
        let mut messages = self.messages().into_iter().rev();
        let root = messages
            .next()
            .unwrap_or_else(|| self.kind.to_string());
        messages.fold(anyhow::Error::msg(root), |err, msg| err.context(msg))
    }
}

impl Drop for Failure {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            match self.ctx.try_pool_mut() {
                Some(mut pool) => {
                    let _ = pool.release(record);
                }
                None => tracing::warn!(%record, "error pool busy, leaking failure record"),
            }
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind)
            .field("record", &self.record)
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for msg in self.messages() {
            writeln!(f, "{msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Failure {}
