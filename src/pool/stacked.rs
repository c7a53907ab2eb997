// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// The stacked pool: one bump arena per worker thread, scopes nest
// as stack frames, and a per-worker reentrant lock keeps tasks from
// interleaving frames on a worker they merely visit.
//
// Builds on the thread-local free-list pattern used elsewhere in this
// codebase (one owning thread, its own storage) generalized to a LIFO frame
// stack, plus the bit-flag reentrancy check used by the dense-lock array.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::pool::{bump_allocate, check_owner, validate_request, Pool, Scope, Segment};
use crate::scheduler::{current_owner, DefaultProbe, Owner, SchedulerProbe};
use crate::slab::{RawSlab, Session};
use crate::slicing::SlicingAllocator;

use super::PoolConfig;

struct WorkerState {
    allocator: SlicingAllocator,
    /// Stack of frame watermarks (`sp` on entry), LIFO close order.
    frames: Vec<u64>,
    /// Task id currently holding the per-worker reentrant lock, if any.
    lock_holder: Option<u64>,
    lock_depth: u32,
}

impl WorkerState {
    fn new(slab: RawSlab) -> Self {
        WorkerState {
            allocator: SlicingAllocator::new(slab),
            frames: Vec::new(),
            lock_holder: None,
            lock_depth: 0,
        }
    }
}

thread_local! {
    static STATE: RefCell<Option<WorkerState>> = const { RefCell::new(None) };
}

fn with_state<R>(session: &dyn Fn() -> CoreResult<RawSlab>, f: impl FnOnce(&mut WorkerState) -> R) -> CoreResult<R> {
    STATE.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(WorkerState::new(session()?));
        }
        Ok(f(slot.as_mut().unwrap()))
    })
}

/// `stacked()` pool.
pub struct StackedPool<S: Session> {
    session: Arc<S>,
    config: PoolConfig,
    next_frame_id: AtomicU64,
}

impl<S: Session + 'static> StackedPool<S> {
    pub(crate) fn new(session: Arc<S>, config: PoolConfig) -> Self {
        StackedPool {
            session,
            config,
            next_frame_id: AtomicU64::new(1),
        }
    }
}

impl<S: Session + 'static> Pool for StackedPool<S> {
    fn get(&self) -> CoreResult<Box<dyn Scope>> {
        let owner = current_owner(&DefaultProbe);
        let creation_worker = DefaultProbe.current_worker_id();
        let session = Arc::clone(&self.session);
        let make_slab = || session.allocate(self.config.pool_size() as usize, self.config.pool_alignment() as usize);

        // Reentrant try-lock: a bare worker nests trivially; a task must
        // either be the current lock holder (reenter) or find the worker
        // unclaimed (first entry). A task trying to nest into a frame owned
        // by a *different* task on a worker it is merely visiting loses.
        let task_id = if let Owner::Task(id) = owner { Some(id) } else { None };

        let frame_id = self.next_frame_id.fetch_add(1, Ordering::Relaxed);
        let watermark = with_state(&make_slab, |state| -> CoreResult<u64> {
            match (state.lock_holder, task_id) {
                (None, _) => {
                    state.lock_holder = task_id;
                    state.lock_depth = 1;
                }
                (Some(holder), Some(id)) if holder == id => {
                    state.lock_depth += 1;
                }
                (Some(_), _) => return Err(CoreError::WrongThread),
            }
            let wm = state.allocator.current_offset();
            state.frames.push(wm);
            Ok(wm)
        })??;

        Ok(Box::new(StackedScope {
            owner,
            creation_worker,
            frame_id,
            watermark,
            open: Arc::new(AtomicBool::new(true)),
            session: Arc::clone(&self.session),
            pool_size: self.config.pool_size(),
            pool_alignment: self.config.pool_alignment(),
            task_id,
            fallback: None,
        }))
    }
}

struct StackedScope<S: Session> {
    owner: Owner,
    creation_worker: u64,
    frame_id: u64,
    watermark: u64,
    open: Arc<AtomicBool>,
    session: Arc<S>,
    pool_size: u64,
    pool_alignment: u64,
    task_id: Option<u64>,
    /// Lazily created growable arena a frame spills into once its slab is
    /// exhausted. Frame-local: dropped along with the frame, never
    /// recycled into the worker's shared slab.
    fallback: Option<bumpalo::Bump>,
}

impl<S: Session + 'static> StackedScope<S> {
    fn check_access(&self) -> CoreResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(CoreError::InvalidScope);
        }
        check_owner(self.owner)?;
        if DefaultProbe.current_worker_id() != self.creation_worker {
            // Frame storage is thread-local to the worker it was created on;
            // a migrated task revisiting it from elsewhere cannot reach the
            // physical arena even though its logical owner still matches.
            return Err(CoreError::WrongThread);
        }
        Ok(())
    }

    fn is_top_frame(&self) -> bool {
        let make_slab = || {
            self.session
                .allocate(self.pool_size as usize, self.pool_alignment as usize)
        };
        with_state(&make_slab, |state| state.frames.last().copied() == Some(self.watermark))
            .unwrap_or(false)
    }

    fn alloc(&mut self, n: usize, a: usize, zeroing: bool) -> CoreResult<Segment> {
        self.check_access()?;
        validate_request(n, a)?;
        let make_slab = || {
            self.session
                .allocate(self.pool_size as usize, self.pool_alignment as usize)
        };
        let primary = with_state(&make_slab, |state| {
            if zeroing {
                state.allocator.allocate(n, a)
            } else {
                state.allocator.allocate_nonzeroing(n, a)
            }
        })?;

        let view = match primary {
            Ok(view) => view,
            Err(CoreError::OutOfCapacity) => {
                log::debug!("stacked pool: frame {} spilling to fallback arena", self.frame_id);
                let bump = self.fallback.get_or_insert_with(bumpalo::Bump::new);
                bump_allocate(bump, n, a, zeroing)?
            }
            Err(e) => return Err(e),
        };
        Ok(Segment::new(view, Arc::clone(&self.open)))
    }
}

impl<S: Session + 'static> Scope for StackedScope<S> {
    fn allocate(&mut self, n: usize, a: usize) -> CoreResult<Segment> {
        self.alloc(n, a, true)
    }

    fn allocate_nonzeroing(&mut self, n: usize, a: usize) -> CoreResult<Segment> {
        self.alloc(n, a, false)
    }

    fn close(&mut self) -> CoreResult<()> {
        self.check_access()?;
        if !self.is_top_frame() {
            // An out-of-order close leaves the frame stack untouched so the
            // caller can close its children first and retry.
            return Err(CoreError::OutOfSequence);
        }
        let make_slab = || {
            self.session
                .allocate(self.pool_size as usize, self.pool_alignment as usize)
        };
        with_state(&make_slab, |state| {
            state.frames.pop();
            state.allocator.reset_to(self.watermark);
            match self.task_id {
                Some(id) if state.lock_holder == Some(id) => {
                    state.lock_depth -= 1;
                    if state.lock_depth == 0 {
                        state.lock_holder = None;
                    }
                }
                None if state.frames.is_empty() => {
                    state.lock_holder = None;
                }
                _ => {}
            }
        })?;
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::SystemSession;

    fn pool() -> StackedPool<SystemSession> {
        StackedPool::new(Arc::new(SystemSession), PoolConfig::new(1024, 8).unwrap())
    }

    #[test]
    fn nested_frames_close_in_lifo_order() {
        let p = pool();
        let mut outer = p.get().unwrap();
        outer.allocate(16, 8).unwrap();
        let mut inner = p.get().unwrap();
        inner.allocate(16, 8).unwrap();

        assert_eq!(outer.close().unwrap_err(), CoreError::OutOfSequence);
        inner.close().unwrap();
        outer.close().unwrap();
    }

    #[test]
    fn allocation_after_close_fails() {
        let p = pool();
        let mut scope = p.get().unwrap();
        scope.close().unwrap();
        assert_eq!(scope.allocate(1, 1).unwrap_err(), CoreError::InvalidScope);
    }

    #[test]
    fn a_request_past_slab_capacity_spills_into_the_fallback_arena() {
        let p = StackedPool::new(Arc::new(SystemSession), PoolConfig::new(64, 8).unwrap());
        let mut scope = p.get().unwrap();
        scope.allocate(64, 8).unwrap();
        let seg = scope.allocate(64, 8).unwrap();
        assert_eq!(seg.len(), 64);
        scope.close().unwrap();
    }

    #[test]
    fn reused_frame_memory_is_zeroed() {
        let p = pool();
        {
            let mut scope = p.get().unwrap();
            let mut seg = scope.allocate(64, 8).unwrap();
            seg.as_mut_slice().unwrap().fill(0xAB);
            scope.close().unwrap();
        }
        let mut scope = p.get().unwrap();
        let seg = scope.allocate(64, 8).unwrap();
        assert!(seg.as_slice().unwrap().iter().all(|&b| b == 0));
    }
}
