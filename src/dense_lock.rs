// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Dense-locks: per-index first-writer election without a full mutex
// per slot.
//
// Two bits per index, four indices packed per byte — generalizes a
// single-word bit-flag trick (a high write-flag bit plus reader count in
// the low bits, mutated with plain `fetch_or`/`fetch_and` rather than a CAS
// loop) to a whole array of independent 2-bit slots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::scheduler::DefaultProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Available,
    Acquired,
    Tombstone,
}

fn decode(bits: u8) -> SlotState {
    match bits & 0b11 {
        0b00 => SlotState::Available,
        0b01 => SlotState::Acquired,
        0b11 => SlotState::Tombstone,
        other => unreachable!("dense-lock slot in unused bit pattern {other:#04b}"),
    }
}

/// A one-shot latch a first writer pre-locks before publishing itself, and
/// releases when its computation finishes (success, error, or rollback).
/// Racing readers that find the side-table entry "acquire and immediately
/// release" it — i.e. block until released.
struct BlockingLatch {
    pending: Mutex<bool>,
    cv: Condvar,
}

impl BlockingLatch {
    fn new_locked() -> Self {
        BlockingLatch {
            pending: Mutex::new(true),
            cv: Condvar::new(),
        }
    }

    fn wait_until_released(&self) {
        let mut guard = self.pending.lock().unwrap();
        while *guard {
            guard = self.cv.wait(guard).unwrap();
        }
    }

    fn release(&self) {
        let mut guard = self.pending.lock().unwrap();
        *guard = false;
        self.cv.notify_all();
    }
}

struct SideEntry {
    owner_worker: u64,
    latch: BlockingLatch,
}

/// Per-index serializing lock array backing stable-array/stable-cell
/// first-writer election.
pub struct DenseLocks {
    length: usize,
    bits: Vec<AtomicU8>,
    side: Mutex<HashMap<usize, std::sync::Arc<SideEntry>>>,
}

fn byte_shift(i: usize) -> (usize, u32) {
    (i / 4, ((i % 4) * 2) as u32)
}

impl DenseLocks {
    /// Create an array of `length` independent locks, all `AVAILABLE`.
    pub fn new(length: usize) -> Self {
        let bytes = length.div_ceil(4).max(1);
        DenseLocks {
            length,
            bits: (0..bytes).map(|_| AtomicU8::new(0)).collect(),
            side: Mutex::new(HashMap::new()),
        }
    }

    /// Number of independently lockable indices.
    pub fn len(&self) -> usize {
        self.length
    }

    fn load_state(&self, i: usize) -> SlotState {
        let (byte, shift) = byte_shift(i);
        let v = self.bits[byte].load(Ordering::Acquire);
        decode(v >> shift)
    }

    /// Whether index `i` has reached its terminal state. An `Acquire` load,
    /// so a caller observing `true` synchronizes-with the winner's `Release`
    /// store in [`DenseLocks::unlock`] and may safely read whatever the
    /// winner published before calling it.
    pub fn is_resolved(&self, i: usize) -> bool {
        self.load_state(i) == SlotState::Tombstone
    }

    /// Attempt to become the first writer for index `i`.
    ///
    /// Returns `Ok(true)` to exactly one caller between `AVAILABLE` and
    /// `TOMBSTONE`; every other caller gets `Ok(false)` once the winner has
    /// published (or tombstoned), or `Err(Recursive)` if it is the winner
    /// calling back into its own index.
    ///
    /// The side table's mutex is the real point of election: a caller that
    /// finds the table empty for `i` while holding that mutex is the sole
    /// writer, full stop. The winner constructs its locked latch, publishes
    /// it into the table, and only then makes the acquire bit visible — that
    /// bit is a fast lock-free path for later tombstone checks, never the
    /// decision itself.
    pub fn lock(&self, i: usize) -> CoreResult<bool> {
        assert!(i < self.length, "dense-lock index out of bounds");
        if self.load_state(i) == SlotState::Tombstone {
            return Ok(false);
        }

        let mut side = self.side.lock().unwrap();
        if let Some(entry) = side.get(&i).cloned() {
            drop(side);
            if entry.owner_worker == DefaultProbe.current_worker_id() {
                return Err(CoreError::Recursive);
            }
            entry.latch.wait_until_released();
            return Ok(false);
        }
        // No contender published yet. Re-check under the lock: `unlock`
        // tombstones before it removes its entry, so a caller that lost the
        // race for `side` to a just-finished winner must not start a second
        // election here.
        if self.load_state(i) == SlotState::Tombstone {
            return Ok(false);
        }

        let entry = std::sync::Arc::new(SideEntry {
            owner_worker: DefaultProbe.current_worker_id(),
            latch: BlockingLatch::new_locked(),
        });
        side.insert(i, entry);
        drop(side);

        let (byte, shift) = byte_shift(i);
        self.bits[byte].fetch_or(0b01u8 << shift, Ordering::Release);
        Ok(true)
    }

    /// The winning caller signals success: tombstone the slot and release
    /// anyone spinning on the side-table entry.
    pub fn unlock(&self, i: usize) {
        let (byte, shift) = byte_shift(i);
        let tomb_mask = 0b10u8 << shift;
        self.bits[byte].fetch_or(tomb_mask, Ordering::Release);
        if let Some(entry) = self.side.lock().unwrap().remove(&i) {
            entry.latch.release();
        }
    }

    /// The winning caller's computation raised: roll the slot back to
    /// `AVAILABLE` so a future caller may retry the election.
    pub fn rollback(&self, i: usize) {
        let (byte, shift) = byte_shift(i);
        let clear_mask = !(0b11u8 << shift);
        self.bits[byte].fetch_and(clear_mask, Ordering::Release);
        if let Some(entry) = self.side.lock().unwrap().remove(&i) {
            entry.latch.release();
        }
    }
}
