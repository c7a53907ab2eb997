// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Stable arrays: a fixed-length row of
// independently set-at-most-once slots, backed by one `DenseLocks`.

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

/// A fixed-length array whose slots may each be written at most once.
pub struct StableArray<T> {
    lock: DenseLocks,
    slots: Vec<UnsafeCell<Slot<T>>>,
}

unsafe impl<T: Send> Sync for StableArray<T> {}

impl<T> StableArray<T> {
    pub fn new(length: usize) -> Self {
        StableArray {
            lock: DenseLocks::new(length.max(1)),
            slots: (0..length).map(|_| UnsafeCell::new(Slot::Unset)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn check_index(&self, i: usize) -> CoreResult<()> {
        if i >= self.slots.len() {
            Err(CoreError::InvalidInput("index out of bounds"))
        } else {
            Ok(())
        }
    }

    pub fn is_set(&self, i: usize) -> CoreResult<bool> {
        self.check_index(i)?;
        Ok(self.lock.is_resolved(i) && matches!(unsafe { &*self.slots[i].get() }, Slot::Set(_)))
    }

    pub fn get(&self, i: usize) -> CoreResult<Option<&T>> {
        self.or_else_null(i)
    }

    pub fn try_set(&self, i: usize, value: T) -> CoreResult<bool> {
        self.check_index(i)?;
        Ok(match self.lock.lock(i) {
            Ok(true) => {
                unsafe { *self.slots[i].get() = Slot::Set(value) };
                self.lock.unlock(i);
                true
            }
            _ => false,
        })
    }

    /// Non-blocking read: `Some(value)` if slot `i` is `SET`, `None` if it
    /// is `UNSET` or errored. Never computes or elects a writer.
    pub fn or_else_null(&self, i: usize) -> CoreResult<Option<&T>> {
        self.check_index(i)?;
        if !self.lock.is_resolved(i) {
            return Ok(None);
        }
        Ok(match unsafe { &*self.slots[i].get() } {
            Slot::Set(v) => Some(v),
            _ => None,
        })
    }

    /// Non-blocking read: returns `default` if slot `i` is not `SET`,
    /// without electing a writer or running any computation.
    pub fn or_else(&self, i: usize, default: T) -> CoreResult<T>
    where
        T: Clone,
    {
        Ok(self.or_else_null(i)?.cloned().unwrap_or(default))
    }

    /// Non-blocking read: fails with `Unset` if slot `i` is still `UNSET`,
    /// or with `Previous(class_name)` if a prior computation for that slot
    /// errored.
    pub fn or_else_throw(&self, i: usize) -> CoreResult<&T> {
        self.check_index(i)?;
        if !self.lock.is_resolved(i) {
            return Err(CoreError::Unset);
        }
        match unsafe { &*self.slots[i].get() } {
            Slot::Set(v) => Ok(v),
            Slot::Error(class) => Err(CoreError::Previous(class)),
            Slot::Unset => Err(CoreError::Unset),
        }
    }

    /// Evaluate slot `i`, computing it with `f` if this is the first caller
    /// to reach that slot. `f` runs at most once per slot across every
    /// concurrent caller.
    pub fn compute_if_unset(&self, i: usize, f: impl FnOnce() -> T) -> CoreResult<&T> {
        self.try_compute_if_unset(i, || Ok(f()))
    }

    /// As [`StableArray::compute_if_unset`], but `f` may fail. A failure
    /// tombstones the slot: every caller (the failing one and all later
    /// ones) observes `Previous(class_name)` forever after.
    pub fn try_compute_if_unset(&self, i: usize, f: impl FnOnce() -> CoreResult<T>) -> CoreResult<&T> {
        self.check_index(i)?;
        match self.lock.lock(i)? {
            true => match f() {
                Ok(v) => {
                    unsafe { *self.slots[i].get() = Slot::Set(v) };
                    self.lock.unlock(i);
                }
                Err(e) => {
                    unsafe { *self.slots[i].get() = Slot::Error(e.class_name()) };
                    self.lock.unlock(i);
                }
            },
            false => {}
        }
        match unsafe { &*self.slots[i].get() } {
            Slot::Set(v) => Ok(v),
            Slot::Error(class) => Err(CoreError::Previous(class)),
            Slot::Unset => unreachable!("dense lock guarantees a terminal state past contention"),
        }
    }
}
