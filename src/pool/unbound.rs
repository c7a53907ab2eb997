// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// The unbound pool: each `allocate()` call takes exactly one
// freshly sized slab straight from the Segment FIFO, rather than packing a
// scope's requests into a shared bump arena. The tradeoff (no intra-scope
// reuse) is recorded in DESIGN.md.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::pool::{check_owner, validate_request, Pool, Scope, Segment};
use crate::scheduler::{current_owner, DefaultProbe, Owner};
use crate::segment_fifo::{FifoMode, SegmentFifo};
use crate::slab::{RawSlab, Session};
use crate::slicing::{align_up, RawView};

/// `unbound()` / `unbound_concurrent()` pool.
pub struct UnboundPool<S: Session> {
    fifo: Arc<SegmentFifo<S>>,
}

impl<S: Session + 'static> UnboundPool<S> {
    pub(crate) fn new(session: Arc<S>, mode: FifoMode) -> Self {
        UnboundPool {
            fifo: Arc::new(SegmentFifo::new(session, mode)),
        }
    }

    pub(crate) fn from_fifo(fifo: Arc<SegmentFifo<S>>) -> Self {
        UnboundPool { fifo }
    }
}

impl<S: Session + 'static> Pool for UnboundPool<S> {
    fn get(&self) -> CoreResult<Box<dyn Scope>> {
        let owner = current_owner(&DefaultProbe);
        Ok(Box::new(UnboundScope {
            owner,
            fifo: Arc::clone(&self.fifo),
            slabs: Mutex::new(HashMap::new()),
            next_handle: std::sync::atomic::AtomicU64::new(0),
            open: Arc::new(AtomicBool::new(true)),
        }))
    }
}

/// A scope backed by the unbound pool: every `allocate` draws a fresh slab
/// from the Segment FIFO and tracks it under a monotonically increasing
/// handle so `close()` can release them all.
pub(crate) struct UnboundScope<S: Session> {
    owner: Owner,
    fifo: Arc<SegmentFifo<S>>,
    slabs: Mutex<HashMap<u64, RawSlab>>,
    next_handle: std::sync::atomic::AtomicU64,
    open: Arc<AtomicBool>,
}

impl<S: Session + 'static> UnboundScope<S> {
    fn check_access(&self) -> CoreResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(CoreError::InvalidScope);
        }
        check_owner(self.owner)
    }

    fn alloc(&self, n: usize, a: usize, zeroing: bool) -> CoreResult<Segment> {
        self.check_access()?;
        validate_request(n, a)?;
        let mut slab = self.fifo.take(n, a)?;
        if zeroing {
            slab.zero_fill();
        }
        // `required_raw_size` inflated the slab so an aligned `n`-byte run
        // always fits somewhere inside it; carve that run out here rather
        // than handing back the slab's own (unaligned) base pointer.
        let base = slab.as_ptr() as usize;
        let aligned = align_up(base, a).ok_or(CoreError::InvalidInput("size/align overflow"))?;
        let ptr = unsafe { slab.as_ptr().add(aligned - base) };
        let handle = self
            .next_handle
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.slabs.lock().unwrap().insert(handle, slab);
        let view = unsafe { RawView::from_raw(ptr, n) };
        Ok(Segment::new(view, Arc::clone(&self.open)))
    }
}

impl<S: Session + 'static> Scope for UnboundScope<S> {
    fn allocate(&mut self, n: usize, a: usize) -> CoreResult<Segment> {
        self.alloc(n, a, true)
    }

    fn allocate_nonzeroing(&mut self, n: usize, a: usize) -> CoreResult<Segment> {
        self.alloc(n, a, false)
    }

    fn close(&mut self) -> CoreResult<()> {
        self.check_access()?;
        self.open.store(false, Ordering::Release);
        for (_, slab) in self.slabs.lock().unwrap().drain() {
            self.fifo.release(slab);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::SystemSession;

    fn pool() -> UnboundPool<SystemSession> {
        UnboundPool::new(Arc::new(SystemSession), FifoMode::SingleOwner)
    }

    #[test]
    fn each_allocation_gets_its_own_backing_slab() {
        let p = pool();
        let mut scope = p.get().unwrap();
        let a = scope.allocate(32, 8).unwrap();
        let b = scope.allocate(32, 8).unwrap();
        assert_ne!(a.as_slice().unwrap().as_ptr(), b.as_slice().unwrap().as_ptr());
        scope.close().unwrap();
    }

    #[test]
    fn close_releases_slabs_back_to_the_fifo() {
        let p = pool();
        let depth_before = p.fifo.bucket_depth(32, 8);
        let mut scope = p.get().unwrap();
        scope.allocate(32, 8).unwrap();
        scope.close().unwrap();
        assert_eq!(p.fifo.bucket_depth(32, 8), depth_before);
    }

    #[test]
    fn allocation_after_close_fails() {
        let p = pool();
        let mut scope = p.get().unwrap();
        scope.close().unwrap();
        assert_eq!(scope.allocate(1, 1).unwrap_err(), CoreError::InvalidScope);
    }

    #[test]
    fn large_alignment_requests_are_actually_aligned() {
        let p = pool();
        let mut scope = p.get().unwrap();
        let seg = scope.allocate(10, 4096).unwrap();
        let ptr = seg.as_slice().unwrap().as_ptr() as usize;
        assert_eq!(ptr % 4096, 0);
        scope.close().unwrap();
    }
}
