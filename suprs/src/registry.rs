//! Weak interning registry for remote object proxies.
//!
//! At most one live proxy exists per path: lookups hand out strong
//! references to the existing instance, and once the last strong reference
//! is gone the stale entry is replaced on the next access. The registry
//! holds only weak handles, so it never keeps an object alive by itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

pub(crate) struct Registry<T> {
    entries: RefCell<HashMap<String, Weak<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns a strong reference to the live proxy at `path`, if any.
    /// A dead entry found on the way is dropped.
    pub(crate) fn lookup(&self, path: &str) -> Option<Rc<T>> {
        let mut entries = self.entries.borrow_mut();
        match entries.get(path) {
            Some(weak) => match weak.upgrade() {
                Some(rc) => Some(rc),
                None => {
                    entries.remove(path);
                    None
                }
            },
            None => None,
        }
    }

    /// Returns the live proxy at `path`, or creates one with `create` and
    /// interns it. The boolean is true when a new instance was created.
    pub(crate) fn get_or_create(&self, path: &str, create: impl FnOnce() -> Rc<T>) -> (Rc<T>, bool) {
        if let Some(existing) = self.lookup(path) {
            return (existing, false);
        }
        self.purge();
        let fresh = create();
        self.entries
            .borrow_mut()
            .insert(path.to_string(), Rc::downgrade(&fresh));
        (fresh, true)
    }

    fn purge(&self) {
        self.entries
            .borrow_mut()
            .retain(|_, weak| weak.strong_count() > 0);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_returns_same_instance() {
        let registry: Registry<u32> = Registry::new();
        let (a, created_a) = registry.get_or_create("/obj/1", || Rc::new(1));
        let (b, created_b) = registry.get_or_create("/obj/1", || Rc::new(2));
        assert!(created_a);
        assert!(!created_b);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_paths_are_distinct_instances() {
        let registry: Registry<u32> = Registry::new();
        let (a, _) = registry.get_or_create("/obj/1", || Rc::new(1));
        let (b, _) = registry.get_or_create("/obj/2", || Rc::new(2));
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn dropped_instance_is_recreated_not_reused() {
        let registry: Registry<u32> = Registry::new();
        let (a, _) = registry.get_or_create("/obj/1", || Rc::new(1));
        drop(a);
        assert!(registry.lookup("/obj/1").is_none());
        let (b, created) = registry.get_or_create("/obj/1", || Rc::new(2));
        assert!(created);
        assert_eq!(*b, 2);
    }

    #[test]
    fn dead_entries_are_purged_on_insert() {
        let registry: Registry<u32> = Registry::new();
        let (a, _) = registry.get_or_create("/obj/1", || Rc::new(1));
        drop(a);
        let (_b, _) = registry.get_or_create("/obj/2", || Rc::new(2));
        assert_eq!(registry.len(), 1);
    }
}
