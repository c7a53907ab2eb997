// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Memoized suppliers: a zero-argument function memoized through a
// single [`StableCell`].

use crate::error::CoreResult;
use crate::stable::cell::StableCell;

/// A zero-argument function whose result is computed at most once.
pub struct StableSupplier<T> {
    cell: StableCell<T>,
    source: Box<dyn Fn() -> CoreResult<T> + Send + Sync>,
}

impl<T> StableSupplier<T> {
    pub fn new(source: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::try_new(move || Ok(source()))
    }

    pub fn try_new(source: impl Fn() -> CoreResult<T> + Send + Sync + 'static) -> Self {
        StableSupplier {
            cell: StableCell::new(),
            source: Box::new(source),
        }
    }

    /// Evaluate the supplier, computing and memoizing on first call.
    pub fn get(&self) -> CoreResult<&T> {
        self.cell.try_compute_if_unset(|| (self.source)())
    }

    pub fn is_set(&self) -> bool {
        self.cell.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn source_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let supplier = StableSupplier::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            "hello"
        });
        assert_eq!(*supplier.get().unwrap(), "hello");
        assert_eq!(*supplier.get().unwrap(), "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unevaluated_supplier_is_not_set() {
        let supplier = StableSupplier::new(|| 1);
        assert!(!supplier.is_set());
        supplier.get().unwrap();
        assert!(supplier.is_set());
    }
}
