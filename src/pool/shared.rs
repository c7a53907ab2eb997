// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// The shared-slab pool: one `SlicingAllocator` handed out per
// `get()`, recycled through a biased thread-local slot with a shared
// fallback stack behind it.
//
// The fallback path uses a plain `Mutex` rather than a hand-rolled
// lock-free stack (see DESIGN.md for the tradeoff). The biased
// thread-local fast path favors "ask your own thread's free list first"
// before falling back to the shared one.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::pool::{bump_allocate, check_owner, validate_request, Pool, Scope, Segment};
use crate::scheduler::{current_owner, DefaultProbe, Owner};
use crate::slab::Session;
use crate::slicing::SlicingAllocator;

use super::PoolConfig;

thread_local! {
    static BIASED: RefCell<Option<Box<SlicingAllocator>>> = const { RefCell::new(None) };
}

struct SharedInner<S: Session> {
    session: Arc<S>,
    pool_size: u64,
    pool_alignment: u64,
    fallback_stack: Mutex<Vec<Box<SlicingAllocator>>>,
}

impl<S: Session> SharedInner<S> {
    fn fresh_allocator(&self) -> CoreResult<Box<SlicingAllocator>> {
        let slab = self
            .session
            .allocate(self.pool_size as usize, self.pool_alignment as usize)?;
        Ok(Box::new(SlicingAllocator::new(slab)))
    }

    fn checkout(&self) -> CoreResult<Box<SlicingAllocator>> {
        let from_bias = BIASED.with(|cell| cell.borrow_mut().take());
        if let Some(alloc) = from_bias {
            return Ok(alloc);
        }
        let from_shared = self.fallback_stack.lock().unwrap().pop();
        match from_shared {
            Some(alloc) => Ok(alloc),
            None => {
                log::trace!("shared-slab pool: allocating a fresh slab");
                self.fresh_allocator()
            }
        }
    }

    fn checkin(&self, mut alloc: Box<SlicingAllocator>) {
        alloc.reset_to(0);
        let leftover = BIASED.with(move |cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_none() {
                *slot = Some(alloc);
                None
            } else {
                Some(alloc)
            }
        });
        if let Some(alloc) = leftover {
            self.fallback_stack.lock().unwrap().push(alloc);
        }
    }
}

/// `shared()` pool.
pub struct SharedSlabPool<S: Session> {
    inner: Arc<SharedInner<S>>,
}

impl<S: Session + 'static> SharedSlabPool<S> {
    pub(crate) fn new(session: Arc<S>, config: PoolConfig) -> Self {
        SharedSlabPool {
            inner: Arc::new(SharedInner {
                session,
                pool_size: config.pool_size(),
                pool_alignment: config.pool_alignment(),
                fallback_stack: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<S: Session + 'static> Pool for SharedSlabPool<S> {
    fn get(&self) -> CoreResult<Box<dyn Scope>> {
        let owner = current_owner(&DefaultProbe);
        let allocator = self.inner.checkout()?;
        Ok(Box::new(SharedSlabScope {
            owner,
            allocator: Some(allocator),
            open: Arc::new(AtomicBool::new(true)),
            inner: Arc::clone(&self.inner),
            fallback: None,
        }))
    }
}

struct SharedSlabScope<S: Session> {
    owner: Owner,
    allocator: Option<Box<SlicingAllocator>>,
    open: Arc<AtomicBool>,
    inner: Arc<SharedInner<S>>,
    /// Lazily created growable arena this scope spills into once its slab
    /// is exhausted. Dropped on close rather than returned to the shared
    /// stack — only the fixed-size slab is recycled.
    fallback: Option<bumpalo::Bump>,
}

impl<S: Session + 'static> SharedSlabScope<S> {
    fn check_access(&self) -> CoreResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(CoreError::InvalidScope);
        }
        check_owner(self.owner)
    }

    fn alloc(&mut self, n: usize, a: usize, zeroing: bool) -> CoreResult<Segment> {
        self.check_access()?;
        validate_request(n, a)?;
        let allocator = self.allocator.as_mut().expect("open scope always holds an allocator");
        let primary = if zeroing {
            allocator.allocate(n, a)
        } else {
            allocator.allocate_nonzeroing(n, a)
        };
        let view = match primary {
            Ok(view) => view,
            Err(CoreError::OutOfCapacity) => {
                log::debug!("shared-slab pool: scope spilling to fallback arena");
                let bump = self.fallback.get_or_insert_with(bumpalo::Bump::new);
                bump_allocate(bump, n, a, zeroing)?
            }
            Err(e) => return Err(e),
        };
        Ok(Segment::new(view, Arc::clone(&self.open)))
    }
}

impl<S: Session + 'static> Scope for SharedSlabScope<S> {
    fn allocate(&mut self, n: usize, a: usize) -> CoreResult<Segment> {
        self.alloc(n, a, true)
    }

    fn allocate_nonzeroing(&mut self, n: usize, a: usize) -> CoreResult<Segment> {
        self.alloc(n, a, false)
    }

    fn close(&mut self) -> CoreResult<()> {
        self.check_access()?;
        let allocator = self.allocator.take().expect("open scope always holds an allocator");
        self.open.store(false, Ordering::Release);
        self.inner.checkin(allocator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::SystemSession;

    fn pool() -> SharedSlabPool<SystemSession> {
        SharedSlabPool::new(Arc::new(SystemSession), PoolConfig::new(256, 8).unwrap())
    }

    #[test]
    fn slab_is_reused_after_close() {
        let p = pool();
        let mut scope = p.get().unwrap();
        let ptr = scope.allocate(16, 8).unwrap().as_slice().unwrap().as_ptr();
        scope.close().unwrap();

        let mut scope2 = p.get().unwrap();
        let ptr2 = scope2.allocate(16, 8).unwrap().as_slice().unwrap().as_ptr();
        assert_eq!(ptr, ptr2);
    }

    #[test]
    fn two_live_scopes_use_distinct_slabs() {
        let p = pool();
        let mut a = p.get().unwrap();
        let mut b = p.get().unwrap();
        let pa = a.allocate(16, 8).unwrap().as_slice().unwrap().as_ptr();
        let pb = b.allocate(16, 8).unwrap().as_slice().unwrap().as_ptr();
        assert_ne!(pa, pb);
        a.close().unwrap();
        b.close().unwrap();
    }

    #[test]
    fn a_request_past_slab_capacity_spills_into_the_fallback_arena() {
        let p = SharedSlabPool::new(Arc::new(SystemSession), PoolConfig::new(32, 8).unwrap());
        let mut scope = p.get().unwrap();
        scope.allocate(32, 8).unwrap();
        let seg = scope.allocate(100, 8).unwrap();
        assert_eq!(seg.len(), 100);
        scope.close().unwrap();
    }

    #[test]
    fn double_close_fails() {
        let p = pool();
        let mut scope = p.get().unwrap();
        scope.close().unwrap();
        assert_eq!(scope.close().unwrap_err(), CoreError::InvalidScope);
    }
}
