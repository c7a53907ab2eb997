// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// The scheduler probe collaborator.
//
// The core must tell bare worker threads apart from light-weight tasks that
// can migrate between workers at any suspension point, and pick its
// confinement policy accordingly. The real probe is
// supplied by the embedding runtime; `DefaultProbe` below is the in-process
// stand-in used by this crate's own pools, tests and benchmarks. It assigns
// each OS thread a stable worker id lazily on first use, and tracks "the
// task currently mounted on this thread" in a thread-local cell that test
// code can push/pop with [`TaskGuard`] to simulate migration.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static WORKER_ID: u64 = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
    static CURRENT_TASK: Cell<Option<u64>> = const { Cell::new(None) };
}

/// The identity an allocation scope is confined to.
///
/// A scope produced while a task is mounted is confined to that *task*,
/// independent of which worker later executes `close()` after a migration.
/// A scope produced on a bare worker is confined to that worker's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Worker(u64),
    Task(u64),
}

/// Consumed collaborator: exposes what the current execution context is.
pub trait SchedulerProbe: Send + Sync {
    /// A stable identifier for the worker thread currently executing.
    fn current_worker_id(&self) -> u64;
    /// Whether the current execution context is a light-weight task.
    fn is_task(&self) -> bool;
    /// The current task's identifier, if [`SchedulerProbe::is_task`] is true.
    fn current_task_id(&self) -> Option<u64>;
}

/// Resolve the [`Owner`] a newly created scope should be confined to.
pub fn current_owner(probe: &dyn SchedulerProbe) -> Owner {
    if probe.is_task() {
        let id = probe
            .current_task_id()
            .expect("is_task() == true implies current_task_id() is Some");
        Owner::Task(id)
    } else {
        Owner::Worker(probe.current_worker_id())
    }
}

/// The in-process default scheduler probe.
///
/// Reports a bare worker unless a [`TaskGuard`] is currently active on this
/// thread, in which case it reports the mounted task's id.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProbe;

impl SchedulerProbe for DefaultProbe {
    fn current_worker_id(&self) -> u64 {
        WORKER_ID.with(|id| *id)
    }

    fn is_task(&self) -> bool {
        CURRENT_TASK.with(|c| c.get().is_some())
    }

    fn current_task_id(&self) -> Option<u64> {
        CURRENT_TASK.with(|c| c.get())
    }
}

/// RAII guard that mounts a task onto the current worker thread for its
/// lifetime, restoring whatever was mounted before on drop. Used by tests
/// and benchmarks to simulate a task suspending on one worker and a
/// (possibly different) task resuming on the same underlying OS thread.
pub struct TaskGuard {
    previous: Option<u64>,
}

impl TaskGuard {
    /// Mount `task_id` on the current thread.
    pub fn enter(task_id: u64) -> Self {
        let previous = CURRENT_TASK.with(|c| c.replace(Some(task_id)));
        TaskGuard { previous }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        CURRENT_TASK.with(|c| c.set(self.previous));
    }
}
