// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// The thread-local-unbound pool: one `UnboundPool` per carrier
// worker, the FIFO locking mode picked once, on that worker's first use —
// concurrent if a task is mounted there (it may migrate away and keep using
// this FIFO from elsewhere), single-owner otherwise.
//
// Rust's `thread_local!` macro cannot be parameterized by the pool's session
// type `S`, so this is emulated with a map keyed by worker id behind a
// single mutex instead of real OS thread-local storage — functionally
// equivalent (every worker only ever touches its own entry) without needing
// a generic thread-local cell.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::CoreResult;
use crate::pool::{Pool, Scope};
use crate::scheduler::{DefaultProbe, SchedulerProbe};
use crate::segment_fifo::{FifoMode, SegmentFifo};
use crate::slab::Session;

/// `thread_local_unbound()` pool.
pub struct ThreadLocalUnboundPool<S: Session> {
    session: Arc<S>,
    per_worker: Mutex<HashMap<u64, Arc<SegmentFifo<S>>>>,
}

impl<S: Session + 'static> ThreadLocalUnboundPool<S> {
    pub(crate) fn new(session: Arc<S>) -> Self {
        ThreadLocalUnboundPool {
            session,
            per_worker: Mutex::new(HashMap::new()),
        }
    }

    fn fifo_for_current_worker(&self) -> Arc<SegmentFifo<S>> {
        let worker_id = DefaultProbe.current_worker_id();
        // A task mounted on this worker may migrate to a different worker
        // later and keep using the FIFO created here, so it needs real
        // locking; a bare worker thread never hands its FIFO to anyone else.
        let mode = if DefaultProbe.is_task() {
            FifoMode::Concurrent
        } else {
            FifoMode::SingleOwner
        };
        let mut map = self.per_worker.lock().unwrap();
        Arc::clone(
            map.entry(worker_id)
                .or_insert_with(|| Arc::new(SegmentFifo::new(Arc::clone(&self.session), mode))),
        )
    }
}

impl<S: Session + 'static> Pool for ThreadLocalUnboundPool<S> {
    fn get(&self) -> CoreResult<Box<dyn Scope>> {
        let fifo = self.fifo_for_current_worker();
        let pool = crate::pool::unbound::UnboundPool::from_fifo(fifo);
        pool.get()
    }
}
