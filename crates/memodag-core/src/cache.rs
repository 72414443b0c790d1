//! Memoised reachability cache.
//!
//! [`ReachCache`] holds the lazily computed ancestor and descendant key sets.
//! Entries are built on first demand by recursing over the adjacency maps,
//! memoising every intermediate vertex on the way, and are dropped -- never
//! patched -- when a mutation changes what they would contain. An absent
//! entry means "not yet computed", never "empty".
//!
//! Locking: the two `RwLock`s guard only the map skeletons and are held just
//! long enough to probe or swap an entry. The recursive build itself runs
//! under the per-key [`KeyedMutex`] slot so concurrent misses on the same key
//! do the work once, while builds for different keys proceed in parallel.
//! Lock order is graph -> cache -> per-key; invalidation takes only the
//! cache locks.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::Store;
use crate::sync::KeyedMutex;

#[derive(Clone, Copy)]
enum Direction {
    Ancestors,
    Descendants,
}

pub(crate) struct ReachCache<K> {
    ancestors: RwLock<HashMap<K, Arc<HashSet<K>>>>,
    descendants: RwLock<HashMap<K, Arc<HashSet<K>>>>,
    /// One build-lock table per direction. A build holds its own key's slot
    /// while recursing into neighbours, so waits always follow edge
    /// direction; ancestor builds recurse against the edges and would
    /// entangle with descendant builds if both shared one table.
    ancestor_locks: KeyedMutex<K>,
    descendant_locks: KeyedMutex<K>,
}

impl<K> ReachCache<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    pub(crate) fn new() -> Self {
        ReachCache {
            ancestors: RwLock::new(HashMap::new()),
            descendants: RwLock::new(HashMap::new()),
            ancestor_locks: KeyedMutex::new(),
            descendant_locks: KeyedMutex::new(),
        }
    }

    /// The transitive closure of `inbound` from `key`, excluding `key`.
    pub(crate) fn ancestors<T>(&self, store: &Store<T, K>, key: &K) -> Arc<HashSet<K>> {
        self.reach(store, key, Direction::Ancestors)
    }

    /// The transitive closure of `outbound` from `key`, excluding `key`.
    pub(crate) fn descendants<T>(&self, store: &Store<T, K>, key: &K) -> Arc<HashSet<K>> {
        self.reach(store, key, Direction::Descendants)
    }

    /// The already-built descendant set of `key`, if any. Does not build.
    pub(crate) fn cached_descendants(&self, key: &K) -> Option<Arc<HashSet<K>>> {
        self.descendants.read().get(key).map(Arc::clone)
    }

    fn reach<T>(&self, store: &Store<T, K>, key: &K, dir: Direction) -> Arc<HashSet<K>> {
        let map = self.map_for(dir);

        if let Some(hit) = map.read().get(key) {
            return Arc::clone(hit);
        }

        let locks = match dir {
            Direction::Ancestors => &self.ancestor_locks,
            Direction::Descendants => &self.descendant_locks,
        };
        locks.with_locked(key, || {
            // Another builder may have published while we waited for the slot.
            if let Some(hit) = map.read().get(key) {
                return Arc::clone(hit);
            }

            let mut set = HashSet::new();
            let neighbours = match dir {
                Direction::Ancestors => store.parents(key),
                Direction::Descendants => store.children(key),
            };
            if let Some(neighbours) = neighbours {
                for neighbour in neighbours {
                    let transitive = self.reach(store, neighbour, dir);
                    set.extend(transitive.iter().cloned());
                    set.insert(neighbour.clone());
                }
            }

            tracing::trace!(reachable = set.len(), "reachability entry built");
            let entry = Arc::new(set);
            map.write().insert(key.clone(), Arc::clone(&entry));
            entry
        })
    }

    fn map_for(&self, dir: Direction) -> &RwLock<HashMap<K, Arc<HashSet<K>>>> {
        match dir {
            Direction::Ancestors => &self.ancestors,
            Direction::Descendants => &self.descendants,
        }
    }

    /// Invalidation for an edge change at `(src, dst)`.
    ///
    /// `desc_of_dst` and `anc_of_src` must have been captured *before* the
    /// adjacency maps were touched: the ancestor sets that changed are those
    /// of dst and everything below it, the descendant sets those of src and
    /// everything above it.
    pub(crate) fn invalidate_edge_change(
        &self,
        src: &K,
        dst: &K,
        anc_of_src: &HashSet<K>,
        desc_of_dst: &HashSet<K>,
    ) {
        {
            let mut ancestors = self.ancestors.write();
            ancestors.remove(dst);
            for descendant in desc_of_dst {
                ancestors.remove(descendant);
            }
        }
        {
            let mut descendants = self.descendants.write();
            descendants.remove(src);
            for ancestor in anc_of_src {
                descendants.remove(ancestor);
            }
        }
        tracing::trace!(
            ancestors_dropped = desc_of_dst.len() + 1,
            descendants_dropped = anc_of_src.len() + 1,
            "cache invalidated after edge change"
        );
    }

    /// Invalidation for a vertex deletion: both directions, for the vertex
    /// itself plus all its former ancestors and descendants.
    pub(crate) fn invalidate_vertex_removal(
        &self,
        key: &K,
        former_ancestors: &HashSet<K>,
        former_descendants: &HashSet<K>,
    ) {
        {
            let mut ancestors = self.ancestors.write();
            ancestors.remove(key);
            for descendant in former_descendants {
                ancestors.remove(descendant);
            }
        }
        {
            let mut descendants = self.descendants.write();
            descendants.remove(key);
            for ancestor in former_ancestors {
                descendants.remove(ancestor);
            }
        }
    }

    /// Drops every entry in both directions.
    pub(crate) fn flush(&self) {
        self.ancestors.write().clear();
        self.descendants.write().clear();
    }

    #[cfg(test)]
    fn has_descendants_entry(&self, key: &K) -> bool {
        self.descendants.read().contains_key(key)
    }

    #[cfg(test)]
    fn has_ancestors_entry(&self, key: &K) -> bool {
        self.ancestors.read().contains_key(key)
    }
}
