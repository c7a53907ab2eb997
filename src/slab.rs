// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// The backing allocator / session collaborator.
//
// The real embedding (a managed runtime's native-memory session manager) owns
// slab lifetime and is out of scope. What the core needs from it is
// exactly `allocate(size, align) -> slab` plus a lifetime that ends when the
// session closes. `SystemSession` below is the in-process default used by
// this crate's own tests and benchmarks: each `RawSlab` it hands out owns and
// frees its own memory independently (global allocator, released on `Drop`),
// which satisfies the same "owning handle, arena-managed lifetime" shape
// without requiring a real native-memory session.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{CoreError, CoreResult};

/// An owned contiguous byte region acquired from a [`Session`].
///
/// `base` is aligned to `align`; `size` is the usable length in bytes.
/// Dropping a `RawSlab` releases its memory back to the global allocator —
/// the in-process stand-in for "the slab is released when its session ends."
pub struct RawSlab {
    ptr: NonNull<u8>,
    size: usize,
    align: usize,
}

// Safety: a `RawSlab` is a bare memory region with no internal synchronization
// of its own; callers serialize access the way the slicing allocator and
// Segment FIFO do (confinement, per-bucket locks).
unsafe impl Send for RawSlab {}

impl RawSlab {
    fn layout(size: usize, align: usize) -> CoreResult<Layout> {
        Layout::from_size_align(size.max(1), align)
            .map_err(|_| CoreError::InvalidInput("size/align does not form a valid layout"))
    }

    /// Allocate a fresh, zero-filled slab of `size` bytes aligned to `align`.
    pub fn zeroed(size: usize, align: usize) -> CoreResult<Self> {
        let layout = Self::layout(size, align)?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(CoreError::OutOfCapacity)?;
        Ok(Self { ptr, size, align })
    }

    /// Base pointer of the slab.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Usable size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment the slab was allocated with.
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Overwrite every byte with zero. Used to re-establish the zeroing
    /// allocator's guarantee when a slab is recycled by the Segment FIFO.
    pub fn zero_fill(&mut self) {
        unsafe { std::ptr::write_bytes(self.ptr.as_ptr(), 0, self.size) };
    }
}

impl Drop for RawSlab {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.size.max(1), self.align)
            .expect("layout was valid at construction");
        unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
    }
}

impl std::fmt::Debug for RawSlab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSlab")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

/// The external backing-allocator collaborator.
///
/// A production embedding backs this with a native-memory session whose
/// lifetime is tied to a managed-runtime scope; this crate only depends on
/// `allocate` returning a slab that outlives every segment view taken from
/// it until the session itself ends.
pub trait Session: Send + Sync {
    /// Acquire a zero-filled slab of `size` bytes aligned to `align`.
    fn allocate(&self, size: usize, align: usize) -> CoreResult<RawSlab>;
}

/// The in-process default `Session`: every slab is an independent global
/// allocation, released individually when dropped. No cross-slab lifetime
/// tracking — appropriate for this crate's own tests, benchmarks, and any
/// embedding that does not need a shared native-memory region.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSession;

impl Session for SystemSession {
    fn allocate(&self, size: usize, align: usize) -> CoreResult<RawSlab> {
        RawSlab::zeroed(size, align)
    }
}
