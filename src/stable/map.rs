// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Stable maps: a fixed-key-domain, value-memoized view built
// directly on [`StableFunction`]. No insertion beyond the declared domain.

use crate::error::CoreResult;
use crate::stable::function::StableFunction;
use std::hash::Hash;

/// A map over a fixed set of keys, whose values are computed lazily, at
/// most once each.
pub struct StableMap<K, V> {
    backing: StableFunction<K, V>,
}

impl<K: Hash + Eq, V> StableMap<K, V> {
    /// Build a map over `keys`, computing values lazily with `source`.
    /// Fails with `DuplicateKey` if `keys` repeats an entry.
    pub fn new(keys: Vec<K>, source: impl Fn(&K) -> V + Send + Sync + 'static) -> CoreResult<Self> {
        Ok(StableMap {
            backing: StableFunction::new(keys, source)?,
        })
    }

    pub fn try_new(
        keys: Vec<K>,
        source: impl Fn(&K) -> CoreResult<V> + Send + Sync + 'static,
    ) -> CoreResult<Self> {
        Ok(StableMap {
            backing: StableFunction::try_new(keys, source)?,
        })
    }

    /// The value for `key`, computing it on first access. Fails with
    /// `NotFound` if `key` is outside the map's declared domain.
    pub fn get(&self, key: &K) -> CoreResult<&V> {
        self.backing.apply(key)
    }

    /// Whether `key` is in the domain and has already been computed.
    pub fn contains_computed(&self, key: &K) -> CoreResult<bool> {
        self.backing.is_set(key)
    }

    /// Always fails: stable maps do not support insertion beyond their
    /// declared key domain.
    pub fn insert(&self, _key: K, _value: V) -> CoreResult<()> {
        Err(crate::error::CoreError::Unsupported("stable map does not support insert"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn values_are_memoized_per_key() {
        let map = StableMap::new(vec!["a", "bb", "ccc"], |k| k.len()).unwrap();
        assert_eq!(*map.get(&"bb").unwrap(), 2);
    }

    #[test]
    fn key_outside_domain_is_not_found() {
        let map = StableMap::new(vec![1, 2], |k| k * 10).unwrap();
        assert_eq!(map.get(&99).unwrap_err(), CoreError::NotFound);
    }

    #[test]
    fn insert_is_unsupported() {
        let map = StableMap::new(vec![1], |k| *k).unwrap();
        assert!(matches!(map.insert(2, 2), Err(CoreError::Unsupported(_))));
    }
}
