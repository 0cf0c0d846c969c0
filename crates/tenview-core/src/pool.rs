//! Fixed-capacity pool for failure diagnostics
//!
//! Every failed tensor carries a handle into an [`ErrorPool`]: a fixed arena
//! of [`UNIT_BYTES`]-sized units from which variable-length error records are
//! carved. Records form causal chains (most recent first) through their
//! `cause` links.
//!
//! # Allocation
//!
//! - Free space is a list of runs kept sorted by ascending size. Runs are
//!   never coalesced.
//! - A request takes the first run large enough, or the largest run when none
//!   is (the message is then truncated to fit).
//! - A run larger than needed is split; the trailing remainder goes back into
//!   the free list at its sorted position.
//! - With no free run at all, [`ExhaustionPolicy::ReclaimOldest`] evicts the
//!   root of the chain being extended; [`ExhaustionPolicy::Fail`] refuses.
//!
//! # Example
//!
//! ```
//! use tenview_core::{provenance, ErrorKind, ErrorPool, PoolConfig};
//!
//! let mut pool = ErrorPool::new(PoolConfig::new(32));
//! let first = pool
//!     .new_error(None, ErrorKind::ShapeMismatch, provenance!("demo"), format_args!("bad shape"))
//!     .unwrap();
//! let prov = provenance!("demo");
//! let second = pool
//!     .new_error(Some(first), ErrorKind::InvalidTensor, prov, format_args!("wrapped"))
//!     .unwrap();
//!
//! let messages: Vec<&str> = pool.chain(second).map(|link| link.message).collect();
//! assert_eq!(messages.len(), 2);
//! assert!(messages[0].ends_with("wrapped"));
//!
//! // `second` holds a link on `first`
//! pool.release(first).unwrap();
//! assert!(pool.is_live(first));
//! pool.release(second).unwrap();
//! assert_eq!(pool.free_units(), pool.capacity_units());
//! ```

use crate::error::ErrorKind;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use thiserror::Error;

/// Minimum allocation granularity of the pool arena, in bytes.
pub const UNIT_BYTES: usize = 16;

/// Environment variable overriding the pool capacity (in units).
pub const ENV_POOL_UNITS: &str = "TENVIEW_ERROR_POOL_UNITS";

/// Environment variable selecting the exhaustion policy (`reclaim` or `fail`).
pub const ENV_POOL_EXHAUSTION: &str = "TENVIEW_POOL_EXHAUSTION";

/// Handle to a record in an [`ErrorPool`].
///
/// Handles are generation-checked: once a record is released or reclaimed,
/// its old handles resolve to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorRef {
    slot: u32,
    generation: u32,
}

impl fmt::Display for ErrorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}

/// Source location prefixed to every stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    file: &'static str,
    func: &'static str,
    line: u32,
}

impl Provenance {
    /// Describe a call site
    pub const fn new(file: &'static str, func: &'static str, line: u32) -> Self {
        Self { file, func, line }
    }
}

impl Provenance {
    /// File name without its directories
    pub fn file_name(&self) -> &'static str {
        self.file.rsplit(['/', '\\']).next().unwrap_or(self.file)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.file_name(), self.line, self.func)
    }
}

/// Capture the current file and line together with an operation name.
///
/// Stored messages name only the file, not its path.
#[macro_export]
macro_rules! provenance {
    ($func:expr) => {
        $crate::pool::Provenance::new(file!(), $func, line!())
    };
}

/// What to do when a record is requested and no free run exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExhaustionPolicy {
    /// Evict the oldest record of the chain being extended
    #[default]
    ReclaimOldest,
    /// Refuse with [`PoolError::Exhausted`]
    Fail,
}

impl FromStr for ExhaustionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reclaim" | "reclaim_oldest" => Ok(ExhaustionPolicy::ReclaimOldest),
            "fail" => Ok(ExhaustionPolicy::Fail),
            other => Err(format!("unknown exhaustion policy '{other}'")),
        }
    }
}

/// Pool sizing and policy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Arena capacity in units of [`UNIT_BYTES`]
    pub units: usize,
    /// Behavior when no free run remains
    pub policy: ExhaustionPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            units: 256,
            policy: ExhaustionPolicy::ReclaimOldest,
        }
    }
}

impl PoolConfig {
    /// Default policy with `units` of capacity
    pub fn new(units: usize) -> Self {
        Self {
            units,
            ..Self::default()
        }
    }

    /// Set the capacity in units
    pub fn units(mut self, units: usize) -> Self {
        self.units = units;
        self
    }

    /// Set the exhaustion policy
    pub fn policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read [`ENV_POOL_UNITS`] and [`ENV_POOL_EXHAUSTION`], keeping defaults
    /// for absent or unparsable values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(units) = std::env::var(ENV_POOL_UNITS)
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.units = units;
        }
        if let Some(policy) = std::env::var(ENV_POOL_EXHAUSTION)
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.policy = policy;
        }
        config
    }
}

/// Errors reported by pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No free run and nothing to reclaim (or reclaiming is disabled)
    #[error("error pool exhausted: no free units and no record to reclaim")]
    Exhausted,

    /// Teardown attempted while records are still live
    #[error("error pool still holds {live} live record(s)")]
    Outstanding { live: usize },

    /// The handle no longer names a live record
    #[error("stale error record handle {0}")]
    StaleRecord(ErrorRef),
}

/// A contiguous range of free units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: usize,
    units: usize,
}

#[derive(Debug)]
struct Record {
    start: usize,
    units: usize,
    text_len: usize,
    kind: ErrorKind,
    cause: Option<ErrorRef>,
    // creator plus one per record naming this one as cause
    links: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    record: Option<Record>,
}

/// One entry of a causal chain, as yielded by [`ErrorPool::chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink<'a> {
    /// Handle of this record
    pub record: ErrorRef,
    /// Taxonomy tag
    pub kind: ErrorKind,
    /// Provenance-prefixed message
    pub message: &'a str,
}

/// Iterator over a causal chain, most recent record first.
pub struct Chain<'a> {
    pool: &'a ErrorPool,
    next: Option<ErrorRef>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = ChainLink<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.next?;
        let rec = self.pool.record(record)?;
        self.next = rec.cause;
        Some(ChainLink {
            record,
            kind: rec.kind,
            message: self.pool.text(rec),
        })
    }
}

/// Counts formatted bytes without writing them.
struct ByteCounter(usize);

impl fmt::Write for ByteCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Writes into an arena run, dropping whole characters that do not fit.
struct RunWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    cap: usize,
}

impl fmt::Write for RunWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            let width = ch.len_utf8();
            if self.len + width > self.cap {
                self.cap = self.len;
                break;
            }
            ch.encode_utf8(&mut self.buf[self.len..self.len + width]);
            self.len += width;
        }
        Ok(())
    }
}

fn units_for(bytes: usize) -> usize {
    bytes.div_ceil(UNIT_BYTES)
}

/// Fixed arena of uniform units holding error records.
pub struct ErrorPool {
    arena: Vec<u8>,
    capacity: usize,
    // ascending by `units`
    free: Vec<Run>,
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
    policy: ExhaustionPolicy,
}

impl ErrorPool {
    /// Initialize a pool; the whole arena starts as one free run.
    pub fn new(config: PoolConfig) -> Self {
        let free = if config.units > 0 {
            vec![Run {
                start: 0,
                units: config.units,
            }]
        } else {
            Vec::new()
        };
        tracing::debug!(units = config.units, policy = ?config.policy, "error pool initialized");
        Self {
            arena: vec![0; config.units * UNIT_BYTES],
            capacity: config.units,
            free,
            slots: Vec::with_capacity(config.units),
            vacant: Vec::new(),
            live: 0,
            policy: config.policy,
        }
    }

    /// Total arena size in units
    pub fn capacity_units(&self) -> usize {
        self.capacity
    }

    /// Units currently in free runs
    pub fn free_units(&self) -> usize {
        self.free.iter().map(|r| r.units).sum()
    }

    /// Sizes of the free runs, in free-list order (ascending)
    pub fn free_run_sizes(&self) -> Vec<usize> {
        self.free.iter().map(|r| r.units).collect()
    }

    /// Number of records currently live
    pub fn live_records(&self) -> usize {
        self.live
    }

    /// Active exhaustion policy
    pub fn policy(&self) -> ExhaustionPolicy {
        self.policy
    }

    /// Change the exhaustion policy
    pub fn set_policy(&mut self, policy: ExhaustionPolicy) {
        self.policy = policy;
    }

    /// Units a fully formatted record would occupy: provenance prefix,
    /// message and terminator, rounded up to whole units.
    pub fn required_units(provenance: &Provenance, args: fmt::Arguments<'_>) -> usize {
        let mut counter = ByteCounter(0);
        // ByteCounter never fails
        let _ = write!(counter, "{provenance} ");
        let _ = counter.write_fmt(args);
        units_for(counter.0 + 1)
    }

    /// Whether `record` names a live record
    pub fn is_live(&self, record: ErrorRef) -> bool {
        self.record(record).is_some()
    }

    /// Stored message of a live record
    pub fn message(&self, record: ErrorRef) -> Option<&str> {
        self.record(record).map(|rec| self.text(rec))
    }

    /// Taxonomy tag of a live record
    pub fn kind(&self, record: ErrorRef) -> Option<ErrorKind> {
        self.record(record).map(|rec| rec.kind)
    }

    /// Cause of a live record, if it is itself still live
    pub fn cause(&self, record: ErrorRef) -> Option<ErrorRef> {
        self.record(record)
            .and_then(|rec| rec.cause)
            .filter(|cause| self.is_live(*cause))
    }

    /// Walk the causal chain starting at `record`.
    pub fn chain(&self, record: ErrorRef) -> Chain<'_> {
        Chain {
            pool: self,
            next: Some(record),
        }
    }

    /// Write each message of the chain on its own line, most recent first.
    pub fn write_chain<W: fmt::Write>(&self, record: ErrorRef, out: &mut W) -> fmt::Result {
        for link in self.chain(record) {
            writeln!(out, "{}", link.message)?;
        }
        Ok(())
    }

    /// Print the chain to standard error.
    pub fn print_chain(&self, record: ErrorRef) {
        for link in self.chain(record) {
            eprintln!("{}", link.message);
        }
    }

    /// Record a new error caused by `prior`.
    ///
    /// The new record takes a link on `prior`, so `prior` stays live until
    /// both its own holder and this record have released it.
    pub fn new_error(
        &mut self,
        prior: Option<ErrorRef>,
        kind: ErrorKind,
        provenance: Provenance,
        args: fmt::Arguments<'_>,
    ) -> Result<ErrorRef, PoolError> {
        let mut cause = prior.filter(|r| self.is_live(*r));

        if self.free.is_empty() {
            match (self.policy, cause) {
                (ExhaustionPolicy::ReclaimOldest, Some(head)) => {
                    cause = self.reclaim_oldest(head);
                }
                _ => {
                    tracing::warn!(kind = %kind, "error pool exhausted");
                    return Err(PoolError::Exhausted);
                }
            }
        }

        let units = Self::required_units(&provenance, args);
        let run = self.acquire(units).ok_or(PoolError::Exhausted)?;
        let run = self.split(run, units);

        let begin = run.start * UNIT_BYTES;
        let end = (run.start + run.units) * UNIT_BYTES;
        let buf = &mut self.arena[begin..end];
        let mut writer = RunWriter {
            buf,
            len: 0,
            cap: run.units * UNIT_BYTES - 1,
        };
        let _ = write!(writer, "{provenance} ");
        let _ = writer.write_fmt(args);
        let text_len = writer.len;
        self.arena[begin + text_len] = 0;

        if let Some(c) = cause {
            if let Some(rec) = self.record_mut(c) {
                rec.links += 1;
            }
        }

        let record = self.occupy(Record {
            start: run.start,
            units: run.units,
            text_len,
            kind,
            cause,
            links: 1,
        });
        tracing::debug!(
            record = %record,
            kind = %kind,
            units = run.units,
            free_units = self.free_units(),
            "error recorded"
        );
        Ok(record)
    }

    /// Drop one link on `record`; records reaching zero links return their
    /// units to the free list and release their cause in turn.
    pub fn release(&mut self, record: ErrorRef) -> Result<(), PoolError> {
        if !self.is_live(record) {
            return Err(PoolError::StaleRecord(record));
        }
        let mut next = Some(record);
        while let Some(current) = next {
            let Some(rec) = self.record_mut(current) else {
                break;
            };
            rec.links -= 1;
            if rec.links > 0 {
                break;
            }
            next = rec.cause;
            self.evict(current);
        }
        Ok(())
    }

    /// Tear the pool down, refusing while records are still live.
    pub fn shutdown(self) -> Result<(), PoolError> {
        if self.live > 0 {
            return Err(PoolError::Outstanding { live: self.live });
        }
        tracing::debug!(units = self.capacity, "error pool shut down");
        Ok(())
    }

    /// Take the first free run with at least `units`, or the largest run.
    fn acquire(&mut self, units: usize) -> Option<Run> {
        if self.free.is_empty() {
            return None;
        }
        let pos = self
            .free
            .iter()
            .position(|r| r.units >= units)
            .unwrap_or(self.free.len() - 1);
        Some(self.free.remove(pos))
    }

    /// Keep the leading `units` of `run`, returning the rest to the free list.
    fn split(&mut self, run: Run, units: usize) -> Run {
        if run.units > units {
            self.insert_free(Run {
                start: run.start + units,
                units: run.units - units,
            });
            Run {
                start: run.start,
                units,
            }
        } else {
            run
        }
    }

    fn insert_free(&mut self, run: Run) {
        let pos = self
            .free
            .iter()
            .position(|r| r.units >= run.units)
            .unwrap_or(self.free.len());
        self.free.insert(pos, run);
    }

    /// Evict the root of the chain starting at `head`.
    ///
    /// Returns the cause the new record should use: `head` itself, or `None`
    /// when `head` was the root.
    fn reclaim_oldest(&mut self, head: ErrorRef) -> Option<ErrorRef> {
        let mut parent = None;
        let mut root = head;
        while let Some(cause) = self.cause(root) {
            parent = Some(root);
            root = cause;
        }
        tracing::warn!(
            record = %root,
            head = %head,
            "error pool full, reclaiming oldest record in chain"
        );
        match parent {
            Some(p) => {
                if let Some(rec) = self.record_mut(p) {
                    rec.cause = None;
                }
                self.evict(root);
                Some(head)
            }
            None => {
                self.evict(root);
                None
            }
        }
    }

    fn record(&self, record: ErrorRef) -> Option<&Record> {
        let slot = self.slots.get(record.slot as usize)?;
        if slot.generation != record.generation {
            return None;
        }
        slot.record.as_ref()
    }

    fn record_mut(&mut self, record: ErrorRef) -> Option<&mut Record> {
        let slot = self.slots.get_mut(record.slot as usize)?;
        if slot.generation != record.generation {
            return None;
        }
        slot.record.as_mut()
    }

    fn text(&self, rec: &Record) -> &str {
        let begin = rec.start * UNIT_BYTES;
        // RunWriter only stores whole characters
        std::str::from_utf8(&self.arena[begin..begin + rec.text_len]).unwrap_or_default()
    }

    fn occupy(&mut self, record: Record) -> ErrorRef {
        self.live += 1;
        if let Some(slot) = self.vacant.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.record = Some(record);
            return ErrorRef {
                slot,
                generation: entry.generation,
            };
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        ErrorRef {
            slot,
            generation: 0,
        }
    }

    /// Remove a record unconditionally and free the span its text occupies.
    fn evict(&mut self, record: ErrorRef) {
        let Some(slot) = self.slots.get_mut(record.slot as usize) else {
            return;
        };
        if slot.generation != record.generation {
            return;
        }
        let Some(rec) = slot.record.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(record.slot);
        self.live -= 1;
        self.insert_free(Run {
            start: rec.start,
            units: rec.units,
        });
    }
}

impl fmt::Debug for ErrorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPool")
            .field("capacity_units", &self.capacity)
            .field("free_units", &self.free_units())
            .field("free_runs", &self.free_run_sizes())
            .field("live_records", &self.live)
            .field("policy", &self.policy)
            .finish()
    }
}
