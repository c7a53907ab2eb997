// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Stable cells: set-at-most-once storage with
// first-writer election over a one-slot `DenseLocks`.
//
// An erroring computation tombstones the cell permanently rather than
// rolling it back for retry — unlike a bare `DenseLocks` caller, a stable
// cell's ERROR state is terminal.

use std::cell::UnsafeCell;

use crate::dense_lock::DenseLocks;
use crate::error::{CoreError, CoreResult};

enum Slot<T> {
    Unset,
    Set(T),
    /// Only the failing computation's class name survives — never its
    /// payload.
    Error(&'static str),
}

/// A cell that may be written at most once, from whichever caller wins the
/// race to compute its value; every other caller observes that value (or
/// error) instead of recomputing.
pub struct StableCell<T> {
    lock: DenseLocks,
    slot: UnsafeCell<Slot<T>>,
}

// Safety: `slot` is only written by the single election winner (guarded by
// `lock`), and every reader synchronizes with that write through
// `DenseLocks::is_resolved`'s Acquire load before touching `slot`.
unsafe impl<T: Send> Sync for StableCell<T> {}

impl<T> StableCell<T> {
    pub fn new() -> Self {
        StableCell {
            lock: DenseLocks::new(1),
            slot: UnsafeCell::new(Slot::Unset),
        }
    }

    /// Whether the cell has reached a terminal state (set or errored).
    pub fn is_set(&self) -> bool {
        self.lock.is_resolved(0) && matches!(unsafe { &*self.slot.get() }, Slot::Set(_))
    }

    /// The cell's value, if it has been successfully set.
    pub fn get(&self) -> Option<&T> {
        if !self.lock.is_resolved(0) {
            return None;
        }
        match unsafe { &*self.slot.get() } {
            Slot::Set(v) => Some(v),
            _ => None,
        }
    }

    /// Non-blocking read: returns `default` if the cell is not `SET`,
    /// without electing a writer or running any computation.
    pub fn or_else(&self, default: T) -> T
    where
        T: Clone,
    {
        if self.lock.is_resolved(0) {
            if let Slot::Set(v) = unsafe { &*self.slot.get() } {
                return v.clone();
            }
        }
        default
    }

    /// Non-blocking read: fails with `Unset` if the cell is still `UNSET`,
    /// or with `Previous(class_name)` if a prior computation errored. Never
    /// computes a value itself.
    pub fn or_else_throw(&self) -> CoreResult<&T> {
        if !self.lock.is_resolved(0) {
            return Err(CoreError::Unset);
        }
        match unsafe { &*self.slot.get() } {
            Slot::Set(v) => Ok(v),
            Slot::Error(class) => Err(CoreError::Previous(class)),
            Slot::Unset => Err(CoreError::Unset),
        }
    }

    /// Attempt to be the cell's first writer. Returns `true` if this call
    /// won the race and `value` is now the cell's permanent contents.
    pub fn try_set(&self, value: T) -> bool {
        match self.lock.lock(0) {
            Ok(true) => {
                unsafe { *self.slot.get() = Slot::Set(value) };
                self.lock.unlock(0);
                true
            }
            _ => false,
        }
    }

    /// Return the cell's value, computing it with `f` if this is the first
    /// caller. `f` runs at most once across every concurrent caller.
    pub fn compute_if_unset(&self, f: impl FnOnce() -> T) -> &T {
        match self.try_compute_if_unset(|| Ok(f())) {
            Ok(v) => v,
            Err(_) => unreachable!("an infallible supplier cannot produce the Error state"),
        }
    }

    /// As [`StableCell::compute_if_unset`], but `f` may fail. A failure
    /// tombstones the cell: every caller (the failing one and all later
    /// ones) observes `Previous(class_name)` forever after.
    pub fn try_compute_if_unset(&self, f: impl FnOnce() -> CoreResult<T>) -> CoreResult<&T> {
        match self.lock.lock(0) {
            Ok(true) => match f() {
                Ok(v) => {
                    unsafe { *self.slot.get() = Slot::Set(v) };
                    self.lock.unlock(0);
                }
                Err(e) => {
                    unsafe { *self.slot.get() = Slot::Error(e.class_name()) };
                    self.lock.unlock(0);
                }
            },
            Ok(false) => {}
            Err(e) => return Err(e),
        }
        match unsafe { &*self.slot.get() } {
            Slot::Set(v) => Ok(v),
            Slot::Error(class) => Err(CoreError::Previous(class)),
            Slot::Unset => unreachable!("dense lock guarantees a terminal state past contention"),
        }
    }
}

impl<T> Default for StableCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn second_try_set_loses() {
        let cell = StableCell::new();
        assert!(cell.try_set(1));
        assert!(!cell.try_set(2));
        assert_eq!(*cell.get().unwrap(), 1);
    }

    #[test]
    fn compute_if_unset_runs_supplier_once_under_contention() {
        let cell = Arc::new(StableCell::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    *cell.compute_if_unset(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        42
                    })
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_computation_is_terminal_and_sheds_its_payload() {
        let cell: StableCell<i32> = StableCell::new();
        let err = cell
            .try_compute_if_unset(|| Err(CoreError::InvalidInput("boom")))
            .unwrap_err();
        assert_eq!(err, CoreError::Previous("InvalidInput"));
        // A later caller observes the same terminal error, not a retry.
        let err2 = cell.try_compute_if_unset(|| Ok(99)).unwrap_err();
        assert_eq!(err2, CoreError::Previous("InvalidInput"));
        assert!(cell.get().is_none());
        assert_eq!(cell.or_else_throw().unwrap_err(), CoreError::Previous("InvalidInput"));
    }

    #[test]
    fn unset_cell_reports_not_set() {
        let cell: StableCell<i32> = StableCell::new();
        assert!(!cell.is_set());
        assert!(cell.get().is_none());
        assert_eq!(cell.or_else_throw().unwrap_err(), CoreError::Unset);
    }

    #[test]
    fn or_else_peeks_without_computing_or_electing() {
        let cell: StableCell<i32> = StableCell::new();
        assert_eq!(cell.or_else(7), 7);
        assert!(!cell.is_set());
        cell.try_set(3);
        assert_eq!(cell.or_else(7), 3);
    }
}
