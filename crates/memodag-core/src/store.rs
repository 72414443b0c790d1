//! Canonical vertex and adjacency storage.
//!
//! [`Store`] owns the two vertex indices (key -> id, id -> payload) and the
//! two adjacency maps (outbound, inbound). It performs no invariant checking
//! of its own beyond keeping the four maps mutually consistent; precondition
//! checks (duplicates, loop detection ordering, error priorities) live in the
//! mutation layer, which is also the only writer.
//!
//! The id -> payload index is an `IndexMap` so that vertex iteration is
//! deterministic (insertion order) without sorting on every access.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use indexmap::IndexMap;

/// The mutable core of a graph: both vertex indices and both adjacency maps.
///
/// Guarded as a whole by the graph lock; see [`Dag`](crate::Dag).
pub(crate) struct Store<T, K> {
    /// key -> id. Bijective with `payloads` over the live vertex set.
    ids: HashMap<K, String>,
    /// id -> key, the inverse of `ids`. Keys are derived once, on insertion.
    keys: HashMap<String, K>,
    /// id -> payload, in insertion order.
    payloads: IndexMap<String, T>,
    /// key -> set of child keys.
    outbound: HashMap<K, HashSet<K>>,
    /// key -> set of parent keys.
    inbound: HashMap<K, HashSet<K>>,
}

impl<T, K> Store<T, K>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Store {
            ids: HashMap::new(),
            keys: HashMap::new(),
            payloads: IndexMap::new(),
            outbound: HashMap::new(),
            inbound: HashMap::new(),
        }
    }

    /// Number of live vertices.
    pub(crate) fn order(&self) -> usize {
        self.payloads.len()
    }

    /// Number of edges.
    pub(crate) fn size(&self) -> usize {
        self.outbound.values().map(HashSet::len).sum()
    }

    pub(crate) fn contains_id(&self, id: &str) -> bool {
        self.payloads.contains_key(id)
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.ids.contains_key(key)
    }

    pub(crate) fn payload(&self, id: &str) -> Option<&T> {
        self.payloads.get(id)
    }

    /// The id registered for `key`, if the key is live.
    pub(crate) fn id_of(&self, key: &K) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }

    /// The key derived for the vertex with this id, if the id is live.
    pub(crate) fn key_of_id(&self, id: &str) -> Option<&K> {
        self.keys.get(id)
    }

    /// Iterates `(id, payload)` in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.payloads.iter().map(|(id, v)| (id.as_str(), v))
    }

    pub(crate) fn insert_vertex(&mut self, key: K, id: String, payload: T) {
        self.ids.insert(key.clone(), id.clone());
        self.keys.insert(id.clone(), key);
        self.payloads.insert(id, payload);
    }

    /// Removes the vertex and every incident edge.
    pub(crate) fn remove_vertex(&mut self, key: &K, id: &str) {
        // Detach from parents' outbound sets.
        if let Some(parents) = self.inbound.remove(key) {
            for parent in parents {
                if let Some(children) = self.outbound.get_mut(&parent) {
                    children.remove(key);
                    if children.is_empty() {
                        self.outbound.remove(&parent);
                    }
                }
            }
        }
        // Detach from children's inbound sets.
        if let Some(children) = self.outbound.remove(key) {
            for child in children {
                if let Some(parents) = self.inbound.get_mut(&child) {
                    parents.remove(key);
                    if parents.is_empty() {
                        self.inbound.remove(&child);
                    }
                }
            }
        }
        self.ids.remove(key);
        self.keys.remove(id);
        self.payloads.shift_remove(id);
    }

    pub(crate) fn insert_edge(&mut self, src: &K, dst: &K) {
        self.outbound
            .entry(src.clone())
            .or_default()
            .insert(dst.clone());
        self.inbound
            .entry(dst.clone())
            .or_default()
            .insert(src.clone());
    }

    pub(crate) fn remove_edge(&mut self, src: &K, dst: &K) {
        if let Some(children) = self.outbound.get_mut(src) {
            children.remove(dst);
            if children.is_empty() {
                self.outbound.remove(src);
            }
        }
        if let Some(parents) = self.inbound.get_mut(dst) {
            parents.remove(src);
            if parents.is_empty() {
                self.inbound.remove(dst);
            }
        }
    }

    pub(crate) fn has_edge(&self, src: &K, dst: &K) -> bool {
        self.outbound
            .get(src)
            .map_or(false, |children| children.contains(dst))
    }

    pub(crate) fn children(&self, key: &K) -> Option<&HashSet<K>> {
        self.outbound.get(key)
    }

    pub(crate) fn parents(&self, key: &K) -> Option<&HashSet<K>> {
        self.inbound.get(key)
    }

    pub(crate) fn is_root(&self, key: &K) -> bool {
        self.inbound.get(key).map_or(true, HashSet::is_empty)
    }

    pub(crate) fn is_leaf(&self, key: &K) -> bool {
        self.outbound.get(key).map_or(true, HashSet::is_empty)
    }

    /// Ids of all vertices without parents, unsorted.
    pub(crate) fn root_ids(&self) -> Vec<String> {
        self.ids
            .iter()
            .filter(|(key, _)| self.is_root(key))
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Ids of all vertices without children, unsorted.
    pub(crate) fn leaf_ids(&self) -> Vec<String> {
        self.ids
            .iter()
            .filter(|(key, _)| self.is_leaf(key))
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Keys of every live vertex, unsorted.
    pub(crate) fn vertex_keys(&self) -> impl Iterator<Item = &K> {
        self.ids.keys()
    }

    /// Child ids of `key` in ascending id order.
    pub(crate) fn sorted_child_ids(&self, key: &K) -> Vec<String> {
        self.sorted_ids(self.outbound.get(key))
    }

    /// Parent ids of `key` in ascending id order.
    pub(crate) fn sorted_parent_ids(&self, key: &K) -> Vec<String> {
        self.sorted_ids(self.inbound.get(key))
    }

    fn sorted_ids(&self, keys: Option<&HashSet<K>>) -> Vec<String> {
        let mut ids: Vec<String> = keys
            .into_iter()
            .flatten()
            .filter_map(|k| self.ids.get(k).cloned())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Returns `true` if inserting `src -> dst` would close a cycle.
    ///
    /// Breadth-first search from `dst` along `outbound`: reaching `src` means
    /// there is already a path `dst ->* src`, so the new edge would loop.
    pub(crate) fn would_loop(&self, src: &K, dst: &K) -> bool {
        let mut fifo = VecDeque::new();
        let mut visited = HashSet::new();
        for child in self.outbound.get(dst).into_iter().flatten() {
            visited.insert(child.clone());
            fifo.push_back(child.clone());
        }
        while let Some(top) = fifo.pop_front() {
            if top == *src {
                return true;
            }
            for child in self.outbound.get(&top).into_iter().flatten() {
                if visited.insert(child.clone()) {
                    fifo.push_back(child.clone());
                }
            }
        }
        false
    }

    /// Checks the `outbound`/`inbound` mirror invariant. Debug builds only.
    #[cfg(any(test, debug_assertions))]
    pub(crate) fn assert_symmetric(&self) {
        for (src, children) in &self.outbound {
            for child in children {
                assert!(
                    self.inbound
                        .get(child)
                        .map_or(false, |parents| parents.contains(src)),
                    "outbound edge missing its inbound mirror"
                );
            }
        }
        for (dst, parents) in &self.inbound {
            for parent in parents {
                assert!(
                    self.outbound
                        .get(parent)
                        .map_or(false, |children| children.contains(dst)),
                    "inbound edge missing its outbound mirror"
                );
            }
        }
    }
}
