// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Integration tests for stable cells and stable arrays: first-writer
// election, terminal errors, and concurrent contention.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use stable_arena::error::CoreError;
use stable_arena::stable::{StableArray, StableCell};

#[test]
fn concurrent_compute_if_unset_runs_the_supplier_exactly_once() {
    let cell = Arc::new(StableCell::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cell = Arc::clone(&cell);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                *cell.compute_if_unset(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::yield_now();
                    7
                })
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 7);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn a_failing_computation_is_remembered_forever_without_its_payload() {
    let cell: StableCell<i32> = StableCell::new();
    let first = cell
        .try_compute_if_unset(|| Err(CoreError::InvalidInput("bad seed")))
        .unwrap_err();
    assert_eq!(first, CoreError::Previous("InvalidInput"));
    let second = cell.try_compute_if_unset(|| Ok(1)).unwrap_err();
    assert_eq!(second, first);
    assert_eq!(cell.or_else_throw().unwrap_err(), CoreError::Previous("InvalidInput"));
}

#[test]
fn or_else_is_a_non_blocking_peek() {
    let cell: StableCell<i32> = StableCell::new();
    assert_eq!(cell.or_else(42), 42);
    cell.try_set(9);
    assert_eq!(cell.or_else(42), 9);
}

#[test]
fn array_slots_are_independent_under_contention() {
    let arr = Arc::new(StableArray::new(4));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let arr = Arc::clone(&arr);
            thread::spawn(move || arr.compute_if_unset(i, || i as i32 * 10).map(|v| *v))
        })
        .collect();
    let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
    results.sort();
    assert_eq!(results, vec![0, 10, 20, 30]);
}

#[test]
fn array_or_else_and_or_else_null_never_compute() {
    let arr: StableArray<i32> = StableArray::new(2);
    assert_eq!(arr.or_else(0, 99).unwrap(), 99);
    assert_eq!(arr.or_else_null(0).unwrap(), None);
    arr.try_set(0, 5).unwrap();
    assert_eq!(arr.or_else(0, 99).unwrap(), 5);
    assert_eq!(arr.or_else_null(0).unwrap(), Some(&5));
}

#[test]
fn out_of_bounds_array_access_is_rejected() {
    let arr: StableArray<i32> = StableArray::new(2);
    assert_eq!(arr.get(9).unwrap_err(), CoreError::InvalidInput("index out of bounds"));
}
