//! Keyed mutex table.
//!
//! [`KeyedMutex`] serialises critical sections per key while letting distinct
//! keys proceed concurrently. The reachability cache uses it to make sure a
//! cache entry is built at most once even when several readers miss on the
//! same key simultaneously.
//!
//! Slots are reference counted: the last holder to leave removes the slot,
//! so the table stays proportional to the number of keys *currently* locked,
//! not the number of keys ever seen.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

struct Slot {
    mu: Arc<Mutex<()>>,
    holders: usize,
}

/// A table of mutexes indexed by key.
pub(crate) struct KeyedMutex<K> {
    slots: DashMap<K, Slot>,
}

impl<K> KeyedMutex<K>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn new() -> Self {
        KeyedMutex {
            slots: DashMap::new(),
        }
    }

    /// Runs `f` while holding the mutex for `key`.
    ///
    /// Reentrant use for the same key on the same thread would deadlock; the
    /// cache build recursion only ever takes locks along graph edges, which
    /// cannot cycle in a DAG.
    pub(crate) fn with_locked<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let mu = self.checkout(key);
        let _release = ReleaseOnDrop { table: self, key };
        let _held = mu.lock();
        f()
    }

    /// Number of live slots. Exposed for tests.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    fn checkout(&self, key: &K) -> Arc<Mutex<()>> {
        let mut slot = self.slots.entry(key.clone()).or_insert_with(|| Slot {
            mu: Arc::new(Mutex::new(())),
            holders: 0,
        });
        slot.holders += 1;
        Arc::clone(&slot.mu)
    }

    fn checkin(&self, key: &K) {
        self.slots.remove_if_mut(key, |_, slot| {
            slot.holders -= 1;
            slot.holders == 0
        });
    }
}

/// Decrements the slot count even if the critical section panics.
struct ReleaseOnDrop<'a, K: Clone + Eq + Hash> {
    table: &'a KeyedMutex<K>,
    key: &'a K,
}

impl<K: Clone + Eq + Hash> Drop for ReleaseOnDrop<'_, K> {
    fn drop(&mut self) {
        self.table.checkin(self.key);
    }
}
