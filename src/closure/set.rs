//! The shared Descendant Set.
//!
//! Reader/writer discipline: membership tests take the shared lock and run
//! concurrently; insertions take the exclusive lock. Most records scanned in
//! a pass are not descendants, so the shared-lock fast path dominates and
//! the exclusive section is only entered on a hit.
//!
//! Ids are only ever inserted. Because nothing is removed, a membership hit
//! observed under the read lock is still true once the write lock is held,
//! so the check-then-insert sequence needs no re-validation.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rayon::prelude::*;

use crate::corpus::EntityRecord;

/// Concurrency-safe, grow-only set of discovered descendant ids.
#[derive(Debug, Default)]
pub struct DescendantSet {
    ids: RwLock<HashSet<String>>,
}

impl DescendantSet {
    /// Build the initial set from seed ids. Duplicates and empty ids are dropped.
    pub fn from_seeds<I>(seeds: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let ids: HashSet<String> = seeds.into_iter().filter(|id| !id.is_empty()).collect();
        Self {
            ids: RwLock::new(ids),
        }
    }

    // A panicking writer can only have inserted whole ids, so a poisoned
    // lock still guards a consistent set.
    fn read(&self) -> RwLockReadGuard<'_, HashSet<String>> {
        self.ids.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<String>> {
        self.ids.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains(id)
    }

    /// Apply the expansion rule to one record.
    ///
    /// If `record.id` is already a known descendant, every child id joins the
    /// set. Otherwise the record is ignored for now; a later pass may pick it
    /// up. Returns the number of ids that were newly inserted.
    pub fn expand(&self, record: EntityRecord) -> usize {
        if record.children.is_empty() || !self.contains(&record.id) {
            return 0;
        }

        let mut ids = self.write();
        let mut added = 0;
        for child in record.children {
            if !child.is_empty() && ids.insert(child) {
                added += 1;
            }
        }
        added
    }

    /// Sorted copy of the current contents.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().iter().cloned().collect();
        ids.par_sort_unstable();
        ids
    }

    /// Consume the set into sorted ids.
    pub fn into_sorted_vec(self) -> Vec<String> {
        let ids = self.ids.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.par_sort_unstable();
        ids
    }
}

/// The only capability a worker gets over the set: `expand`.
#[derive(Debug, Clone)]
pub struct ExpandHandle {
    set: Arc<DescendantSet>,
}

impl ExpandHandle {
    pub fn new(set: Arc<DescendantSet>) -> Self {
        Self { set }
    }

    pub fn expand(&self, record: EntityRecord) -> usize {
        self.set.expand(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn seeds(ids: &[&str]) -> DescendantSet {
        DescendantSet::from_seeds(ids.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_seeds_are_deduplicated() {
        let set = seeds(&["A", "B", "A", "", "B"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("A"));
        assert!(set.contains("B"));
        assert!(!set.contains(""));
    }

    #[test]
    fn test_expand_unknown_parent_is_noop() {
        let set = seeds(&["A"]);
        let added = set.expand(EntityRecord::new("C", ["D"]));
        assert_eq!(added, 0);
        assert_eq!(set.len(), 1);
        assert!(!set.contains("D"));
    }

    #[test]
    fn test_expand_known_parent_adds_children() {
        let set = seeds(&["A"]);
        let added = set.expand(EntityRecord::new("A", ["B", "C", "B", ""]));
        assert_eq!(added, 2);
        assert_eq!(set.to_sorted_vec(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_expand_is_idempotent() {
        let set = seeds(&["A"]);
        set.expand(EntityRecord::new("A", ["B"]));
        let again = set.expand(EntityRecord::new("A", ["B"]));
        assert_eq!(again, 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_self_cycle_terminates() {
        let set = seeds(&["A"]);
        assert_eq!(set.expand(EntityRecord::new("A", ["A"])), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_concurrent_discovery_of_same_child() {
        let set = Arc::new(seeds(&["P"]));
        let children: Vec<String> = (0..500).map(|i| format!("C{i}")).collect();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let handle = ExpandHandle::new(Arc::clone(&set));
                let children = children.clone();
                thread::spawn(move || handle.expand(EntityRecord::new("P", children)))
            })
            .collect();

        let added: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // Every child is inserted by exactly one worker.
        assert_eq!(added, 500);
        assert_eq!(set.len(), 501);
    }

    #[test]
    fn test_into_sorted_vec() {
        let set = seeds(&["b", "c", "a"]);
        assert_eq!(set.into_sorted_vec(), vec!["a", "b", "c"]);
    }
}
