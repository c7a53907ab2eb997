// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Memoized int-functions: `apply(i)` calls the backing function at
// most once per `i`, backed directly by a bounded [`StableArray`].

use crate::error::{CoreError, CoreResult};
use crate::stable::array::StableArray;

/// A function over `0..size` memoized per-argument.
pub struct StableIntFunction<T> {
    array: StableArray<T>,
    source: Box<dyn Fn(i32) -> CoreResult<T> + Send + Sync>,
}

impl<T> StableIntFunction<T> {
    /// Build a memoized function over `[0, size)`, computed with `source`.
    pub fn new(size: usize, source: impl Fn(i32) -> T + Send + Sync + 'static) -> Self {
        Self::try_new(size, move |i| Ok(source(i)))
    }

    /// As [`StableIntFunction::new`], but `source` may fail; a failing
    /// argument's result is remembered (terminal error, not retried).
    pub fn try_new(size: usize, source: impl Fn(i32) -> CoreResult<T> + Send + Sync + 'static) -> Self {
        StableIntFunction {
            array: StableArray::new(size),
            source: Box::new(source),
        }
    }

    pub fn size(&self) -> usize {
        self.array.len()
    }

    fn index_of(&self, i: i32) -> CoreResult<usize> {
        let idx = usize::try_from(i).map_err(|_| CoreError::InvalidInput("argument out of bounds"))?;
        if idx >= self.array.len() {
            return Err(CoreError::InvalidInput("argument out of bounds"));
        }
        Ok(idx)
    }

    /// Evaluate at `i`, computing and memoizing on first call.
    pub fn apply(&self, i: i32) -> CoreResult<&T> {
        let idx = self.index_of(i)?;
        self.array.try_compute_if_unset(idx, || (self.source)(i))
    }

    /// Whether `i` has already been computed.
    pub fn is_set(&self, i: i32) -> CoreResult<bool> {
        let idx = self.index_of(i)?;
        self.array.is_set(idx)
    }
}
