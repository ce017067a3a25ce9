//! Concurrent membership set used by host rules.
//!
//! # Design Decisions
//! - One `RwLock` guards the backing `HashSet` for every operation, reads included
//! - Batch operations hold the lock once, so a batch is atomic to other callers
//! - A poisoned lock is recovered, not propagated: the set holds plain values
//!   and no operation leaves it half-updated

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A set of values supporting batched mutation and linearizable lookups.
pub struct RuleSet<T> {
    items: RwLock<HashSet<T>>,
}

impl<T: Eq + Hash> RuleSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashSet::new()),
        }
    }

    /// Insert every value from `values`.
    pub fn add(&self, values: impl IntoIterator<Item = T>) {
        let mut items = self.write();
        items.extend(values);
    }

    /// Returns true if `value` is a member.
    pub fn has<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.read().contains(value)
    }

    /// Remove every value from `values`. Absent values are ignored.
    pub fn remove(&self, values: impl IntoIterator<Item = T>) {
        let mut items = self.write();
        for value in values {
            items.remove(&value);
        }
    }

    /// Remove all values.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Eq + Hash> Default for RuleSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash> FromIterator<T> for RuleSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<T: Eq + Hash + fmt::Debug> fmt::Debug for RuleSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.read().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn add_has_remove_clear() {
        let set = RuleSet::new();
        set.add([1_i64, 2, 3]);
        assert!(set.has(&2));
        assert!(!set.has(&4));

        set.remove([2_i64, 99]);
        assert!(!set.has(&2));
        assert_eq!(set.len(), 2);

        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn string_lookup_by_str() {
        let set: RuleSet<String> = ["v2".to_string()].into_iter().collect();
        assert!(set.has("v2"));
        assert!(!set.has("v1"));
        assert!(!set.has(""));
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let set = Arc::new(RuleSet::<i64>::new());
        set.add([0]);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        let v = t * 10_000 + i;
                        set.add([v]);
                        assert!(set.has(&v));
                        assert!(set.has(&0));
                        set.remove([v]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(set.len(), 1);
    }
}
