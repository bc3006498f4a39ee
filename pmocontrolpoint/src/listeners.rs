//! Liste de listeners copy-on-write.
//!
//! Fan-out iterates over a snapshot, so a listener may add or remove
//! listeners (itself included) from inside its callback.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

pub struct ListenerList<L: ?Sized> {
    inner: RwLock<Arc<Vec<Arc<L>>>>,
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl<L: ?Sized> ListenerList<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the listener was already registered.
    pub fn add(&self, listener: Arc<L>) -> bool {
        let mut guard = self.inner.write();
        if guard.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
        true
    }

    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut guard = self.inner.write();
        if !guard.iter().any(|l| same_listener(l, listener)) {
            return false;
        }
        let next: Vec<Arc<L>> = guard
            .iter()
            .filter(|l| !same_listener(l, listener))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    pub fn clear(&self) {
        *self.inner.write() = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<L>>> {
        Arc::clone(&self.inner.read())
    }

    /// Calls `f` on every listener of the current snapshot.
    ///
    /// A panicking listener is logged and skipped; the others are still called.
    pub fn for_each<F>(&self, event: &str, f: F)
    where
        F: Fn(&L),
    {
        let snapshot = self.snapshot();
        for listener in snapshot.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(listener)));
            if outcome.is_err() {
                error!(event, "Listener panicked during fan-out, ignoring");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Counter: Send + Sync {
        fn hit(&self);
    }

    #[derive(Default)]
    struct Hits(AtomicUsize);

    impl Counter for Hits {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Boom;

    impl Counter for Boom {
        fn hit(&self) {
            panic!("boom");
        }
    }

    #[test]
    fn test_duplicate_registration_is_noop() {
        let list: ListenerList<dyn Counter> = ListenerList::new();
        let hits = Arc::new(Hits::default());
        let as_dyn: Arc<dyn Counter> = hits.clone();

        assert!(list.add(as_dyn.clone()));
        assert!(!list.add(as_dyn.clone()));
        list.for_each("test", |l| l.hit());

        assert_eq!(hits.0.load(Ordering::SeqCst), 1);
        assert!(list.remove(&as_dyn));
        assert!(!list.remove(&as_dyn));
        assert!(list.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_stop_fan_out() {
        let list: ListenerList<dyn Counter> = ListenerList::new();
        let hits = Arc::new(Hits::default());
        list.add(Arc::new(Boom));
        list.add(hits.clone());

        list.for_each("test", |l| l.hit());

        assert_eq!(hits.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_is_stable_during_mutation() {
        let list: ListenerList<dyn Counter> = ListenerList::new();
        list.add(Arc::new(Hits::default()));
        let snapshot = list.snapshot();
        list.clear();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(list.len(), 0);
    }
}
