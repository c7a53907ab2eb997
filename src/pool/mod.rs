// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Arena pool variants and their shared `Pool`/`Scope` contract.
//
// The set of pool variants is closed, so each is modeled as a separate
// implementer of two small traits, `Pool` and `Scope`, rather than a
// hand-rolled enum dispatch: one trait, one impl per variant, selected at
// construction rather than switched on at every call site.

mod stacked;
mod shared;
mod unbound;
mod thread_local_pool;

pub use stacked::StackedPool;
pub use shared::SharedSlabPool;
pub use unbound::UnboundPool;
pub use thread_local_pool::ThreadLocalUnboundPool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::scheduler::{current_owner, DefaultProbe, Owner, SchedulerProbe};
use crate::segment_fifo::FifoMode;
use crate::slab::Session;
use crate::slicing::RawView;

/// Initial-slab configuration for a pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pool_size: u64,
    pool_alignment: u64,
}

impl PoolConfig {
    /// Validate and build a configuration. `pool_alignment` must be a power
    /// of two.
    pub fn new(pool_size: u64, pool_alignment: u64) -> CoreResult<Self> {
        if pool_alignment == 0 || !pool_alignment.is_power_of_two() {
            return Err(CoreError::InvalidInput("pool_alignment must be a power of two"));
        }
        Ok(PoolConfig { pool_size, pool_alignment })
    }

    pub fn pool_size(&self) -> u64 {
        self.pool_size
    }

    pub fn pool_alignment(&self) -> u64 {
        self.pool_alignment
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            pool_size: 64 * 1024,
            pool_alignment: 16,
        }
    }
}

/// A live view into pooled memory.
///
/// Valid only while its originating [`Scope`] remains open; reads/writes
/// after `close()` fail with [`CoreError::InvalidScope`].
pub struct Segment {
    view: RawView,
    open: Arc<AtomicBool>,
}

impl Segment {
    pub(crate) fn new(view: RawView, open: Arc<AtomicBool>) -> Self {
        Segment { view, open }
    }

    /// Byte length of the segment.
    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Borrow the segment's bytes, failing if its scope has been closed.
    pub fn as_slice(&self) -> CoreResult<&[u8]> {
        if !self.open.load(Ordering::Acquire) {
            return Err(CoreError::InvalidScope);
        }
        Ok(unsafe { self.view.as_slice() })
    }

    /// Mutably borrow the segment's bytes, failing if its scope has closed.
    pub fn as_mut_slice(&mut self) -> CoreResult<&mut [u8]> {
        if !self.open.load(Ordering::Acquire) {
            return Err(CoreError::InvalidScope);
        }
        Ok(unsafe { self.view.as_mut_slice() })
    }
}

/// A confined allocation scope.
///
/// Single-use: once `close()` succeeds, every operation (including another
/// `close()`) fails with `InvalidScope`. All operations fail with
/// `WrongThread` when invoked from outside the producing thread/task.
pub trait Scope: Send {
    fn allocate(&mut self, n: usize, a: usize) -> CoreResult<Segment>;
    fn allocate_nonzeroing(&mut self, n: usize, a: usize) -> CoreResult<Segment>;

    /// Close the scope. On `OutOfSequence` (a non-top stacked frame) the
    /// scope is left open so the caller may retry after closing its
    /// children.
    fn close(&mut self) -> CoreResult<()>;
}

/// A pool of confined allocation scopes.
pub trait Pool: Send + Sync {
    fn get(&self) -> CoreResult<Box<dyn Scope>>;
}

fn check_owner(owner: Owner) -> CoreResult<()> {
    if current_owner(&DefaultProbe) != owner {
        Err(CoreError::WrongThread)
    } else {
        Ok(())
    }
}

fn validate_request(n: usize, a: usize) -> CoreResult<()> {
    if a == 0 || !a.is_power_of_two() {
        return Err(CoreError::InvalidInput("alignment must be a power of two"));
    }
    let _ = n;
    Ok(())
}

/// Allocate `n` bytes aligned to `a` out of a growable `bumpalo::Bump`,
/// rather than the fixed-slab slicing allocator. Unlike the slicing
/// allocator, this must never refuse with `OutOfCapacity` — `bumpalo` grows
/// its own backing chunks on demand.
///
/// Shared by the stacked and shared-slab pools as their overflow path: both
/// fall back to a per-scope `Bump` transparently when their primary
/// fixed-slab allocator runs out of room, rather than surfacing
/// `OutOfCapacity` to the caller.
pub(crate) fn bump_allocate(bump: &mut bumpalo::Bump, n: usize, a: usize, zeroing: bool) -> CoreResult<RawView> {
    let layout = std::alloc::Layout::from_size_align(n.max(1), a)
        .map_err(|_| CoreError::InvalidInput("size/align does not form a valid layout"))?;
    let ptr = bump.alloc_layout(layout).as_ptr();
    if zeroing {
        unsafe { std::ptr::write_bytes(ptr, 0, n) };
    }
    Ok(unsafe { RawView::from_raw(ptr, n) })
}

/// `stacked(pool_size, pool_alignment)`.
pub fn stacked<S: Session + 'static>(session: Arc<S>, config: PoolConfig) -> StackedPool<S> {
    StackedPool::new(session, config)
}

/// `shared(pool_size, pool_alignment)`.
pub fn shared<S: Session + 'static>(session: Arc<S>, config: PoolConfig) -> SharedSlabPool<S> {
    SharedSlabPool::new(session, config)
}

/// `unbound()` — single-owner Segment FIFO.
pub fn unbound<S: Session + 'static>(session: Arc<S>) -> UnboundPool<S> {
    UnboundPool::new(session, FifoMode::SingleOwner)
}

/// `unbound_concurrent()` — multi-producer/multi-consumer Segment FIFO.
pub fn unbound_concurrent<S: Session + 'static>(session: Arc<S>) -> UnboundPool<S> {
    UnboundPool::new(session, FifoMode::Concurrent)
}

/// `thread_local_unbound()`.
pub fn thread_local_unbound<S: Session + 'static>(session: Arc<S>) -> ThreadLocalUnboundPool<S> {
    ThreadLocalUnboundPool::new(session)
}
