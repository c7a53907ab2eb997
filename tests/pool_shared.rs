// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Integration tests for the shared-slab pool: slab recycling through the
// biased slot, independence between concurrently live scopes.

use std::sync::Arc;
use std::thread;

use stable_arena::pool::shared;
use stable_arena::{CoreError, Pool, PoolConfig, Scope};
use stable_arena::SystemSession;

fn pool() -> impl Pool {
    shared(Arc::new(SystemSession), PoolConfig::new(512, 8).unwrap())
}

#[test]
fn slab_is_recycled_after_close_on_the_same_thread() {
    let p = pool();
    let mut first = p.get().unwrap();
    let ptr = first.allocate(32, 8).unwrap().as_slice().unwrap().as_ptr();
    first.close().unwrap();

    let mut second = p.get().unwrap();
    let ptr2 = second.allocate(32, 8).unwrap().as_slice().unwrap().as_ptr();
    assert_eq!(ptr, ptr2);
    second.close().unwrap();
}

#[test]
fn two_concurrently_open_scopes_never_alias() {
    let p = pool();
    let mut a = p.get().unwrap();
    let mut b = p.get().unwrap();
    let seg_a = a.allocate(64, 8).unwrap();
    let seg_b = b.allocate(64, 8).unwrap();
    assert_ne!(seg_a.as_slice().unwrap().as_ptr(), seg_b.as_slice().unwrap().as_ptr());
    a.close().unwrap();
    b.close().unwrap();
}

#[test]
fn a_second_os_thread_gets_served_independently() {
    let p = Arc::new(pool());
    let _held = p.get().unwrap();
    let other = {
        let p = Arc::clone(&p);
        thread::spawn(move || {
            let mut scope = p.get().unwrap();
            let seg = scope.allocate(16, 8).unwrap();
            assert_eq!(seg.len(), 16);
            scope.close().unwrap();
        })
    };
    other.join().unwrap();
}

#[test]
fn double_close_is_rejected() {
    let p = pool();
    let mut scope = p.get().unwrap();
    scope.close().unwrap();
    assert_eq!(scope.close().unwrap_err(), CoreError::InvalidScope);
}
