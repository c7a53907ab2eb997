// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Pooled native-memory allocation arenas and set-at-most-once stable cells
// for embedding in a managed runtime's standard library.
//
// Two independent subsystems live here:
//
// - `pool`: four arena pool variants (`stacked`, `shared`, `unbound`,
//   `thread_local_unbound`) handing out confined [`pool::Scope`]s backed by
//   a bump-pointer [`slicing::SlicingAllocator`] and a size-bucketed
//   [`segment_fifo::SegmentFifo`] free list.
// - `stable`: set-at-most-once cells and the memoized function/array/
//   list/map/supplier constructs built on top of them, using
//   [`dense_lock::DenseLocks`] for first-writer election.
//
// The two subsystems guard concurrent access differently. `pool` scopes are
// confined: each one records the task or worker thread that produced it (see
// `scheduler`) and rejects access from anyone else. `stable` constructs carry
// no owner at all — they are deliberately shared across every thread that
// holds a reference, and rely on `dense_lock::DenseLocks` to serialize the
// one first-writer election per index rather than on exclusive ownership.

pub mod backoff;
pub mod dense_lock;
pub mod error;
pub mod pool;
pub mod scheduler;
pub mod segment_fifo;
pub mod slab;
pub mod slicing;
pub mod spin_lock;
pub mod stable;

pub use error::{CoreError, CoreResult};
pub use pool::{Pool, PoolConfig, Scope, Segment};
pub use scheduler::{Owner, SchedulerProbe};
pub use slab::{RawSlab, Session, SystemSession};
