//! Reader/writer-locked map used for the live segment registry.
//!
//! Read-heavy: fast finishers scan it looking for steal victims while the
//! scheduler inserts and removes entries. Segment counts stay small
//! (well under 32), so a plain RwLock over a HashMap is enough.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

pub struct ConMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for ConMap<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V> ConMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one if present.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.write().unwrap().insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().unwrap().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Run `f` over the value for `key` under the read lock.
    pub fn with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.inner.read().unwrap().get(key).map(f)
    }

    /// Fold over all entries under the read lock.
    pub fn fold<A>(&self, init: A, mut f: impl FnMut(A, &K, &V) -> A) -> A {
        let guard = self.inner.read().unwrap();
        let mut acc = init;
        for (k, v) in guard.iter() {
            acc = f(acc, k, v);
        }
        acc
    }

    /// Run `f` with exclusive access to the whole map. Used when a scan
    /// and a mutation must be atomic (e.g. picking a steal victim).
    pub fn with_all_mut<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        f(&mut self.inner.write().unwrap())
    }
}

impl<K: Eq + Hash, V: Clone> ConMap<K, V> {
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().unwrap().get(key).cloned()
    }
}
