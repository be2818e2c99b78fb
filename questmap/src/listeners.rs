//! Copy-on-write listener collection.
//!
//! Every component that publishes events (quest stores, visibility filters,
//! the visible quest registry) keeps its subscribers in a [`ListenerList`].
//! Delivery iterates over a snapshot, so listeners may be added or removed
//! from any thread, including from inside a callback, without blocking or
//! invalidating an in-progress delivery.

use std::sync::Arc;

use parking_lot::RwLock;

/// Append-mostly, read-heavy list of shared listeners.
pub struct ListenerList<L: ?Sized> {
    inner: RwLock<Arc<Vec<Arc<L>>>>,
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> ListenerList<L> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Add a listener. Adding the same `Arc` twice delivers twice.
    pub fn add(&self, listener: Arc<L>) {
        let mut guard = self.inner.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
    }

    /// Remove the first entry pointing at the same allocation as `listener`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut guard = self.inner.write();
        let Some(index) = guard.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return false;
        };
        let mut next: Vec<Arc<L>> = guard.as_ref().clone();
        next.remove(index);
        *guard = Arc::new(next);
        true
    }

    /// Current listeners. The lock is released before the caller iterates.
    pub fn snapshot(&self) -> Arc<Vec<Arc<L>>> {
        Arc::clone(&self.inner.read())
    }

    /// Invoke `f` for every listener in the current snapshot.
    pub fn for_each(&self, mut f: impl FnMut(&L)) {
        let snapshot = self.snapshot();
        for listener in snapshot.iter() {
            f(listener);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerList<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.len())
            .finish()
    }
}
