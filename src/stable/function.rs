// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Memoized keyed functions: a fixed key domain resolved through
// an open-addressed table, values memoized one `StableArray` slot per key.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{CoreError, CoreResult};
use crate::stable::array::StableArray;

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// A function over a fixed, known set of keys, memoized per-key.
pub struct StableFunction<K, V> {
    keys: Vec<Option<K>>,
    capacity: usize,
    values: StableArray<V>,
    source: Box<dyn Fn(&K) -> CoreResult<V> + Send + Sync>,
}

impl<K: Hash + Eq, V> StableFunction<K, V> {
    /// Build a memoized function over `domain`, computed lazily with
    /// `source`. Fails with `DuplicateKey` if `domain` repeats a key.
    pub fn new(domain: Vec<K>, source: impl Fn(&K) -> V + Send + Sync + 'static) -> CoreResult<Self> {
        Self::try_new(domain, move |k| Ok(source(k)))
    }

    /// As [`StableFunction::new`], but `source` may fail.
    pub fn try_new(
        domain: Vec<K>,
        source: impl Fn(&K) -> CoreResult<V> + Send + Sync + 'static,
    ) -> CoreResult<Self> {
        let capacity = (domain.len().max(1) * 2).next_power_of_two();
        let mask = capacity - 1;
        let mut keys: Vec<Option<K>> = (0..capacity).map(|_| None).collect();

        for key in domain {
            let mut idx = (hash_of(&key) as usize) & mask;
            loop {
                match &keys[idx] {
                    None => {
                        keys[idx] = Some(key);
                        break;
                    }
                    Some(existing) if *existing == key => return Err(CoreError::DuplicateKey),
                    _ => idx = (idx + 1) & mask,
                }
            }
        }

        Ok(StableFunction {
            keys,
            capacity,
            values: StableArray::new(capacity),
            source: Box::new(source),
        })
    }

    fn slot_of(&self, key: &K) -> Option<usize> {
        let mask = self.capacity - 1;
        let mut idx = (hash_of(key) as usize) & mask;
        for _ in 0..self.capacity {
            match &self.keys[idx] {
                Some(existing) if existing == key => return Some(idx),
                None => return None,
                _ => idx = (idx + 1) & mask,
            }
        }
        None
    }

    /// Evaluate at `key`, computing and memoizing on first call. Fails with
    /// `NotFound` if `key` was not part of the function's domain.
    pub fn apply(&self, key: &K) -> CoreResult<&V> {
        let idx = self.slot_of(key).ok_or(CoreError::NotFound)?;
        self.values.try_compute_if_unset(idx, || (self.source)(key))
    }

    /// Whether `key` is in the domain and has already been computed.
    pub fn is_set(&self, key: &K) -> CoreResult<bool> {
        let idx = self.slot_of(key).ok_or(CoreError::NotFound)?;
        self.values.is_set(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn memoizes_per_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let f = StableFunction::new(vec!["a", "b", "c"], move |k| {
            calls2.fetch_add(1, Ordering::SeqCst);
            k.len()
        })
        .unwrap();
        assert_eq!(*f.apply(&"b").unwrap(), 1);
        assert_eq!(*f.apply(&"b").unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn key_outside_domain_is_not_found() {
        let f = StableFunction::new(vec![1, 2, 3], |k| k * 10).unwrap();
        assert_eq!(f.apply(&99).unwrap_err(), CoreError::NotFound);
    }

    #[test]
    fn duplicate_key_in_domain_is_rejected() {
        let result = StableFunction::new(vec![1, 1], |k| *k);
        assert_eq!(result.err(), Some(CoreError::DuplicateKey));
    }
}
