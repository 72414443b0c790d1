//! Whole-graph traversals and interruptible reachability walkers.
//!
//! The three walks (DFS, BFS, topological) visit every vertex exactly once
//! under a single graph read lock, with deterministic order: roots and
//! children are always expanded in ascending id order.
//!
//! The walkers ([`Dag::descendants_walker`], [`Dag::ancestors_walker`]) are
//! breadth-first id streams that own the graph read lock for as long as they
//! live. Consumers must drain or drop them promptly -- a parked walker keeps
//! writers out. The companion [`CancelToken`] is clonable and `Send`, so
//! another thread can stop the stream at its next yield point; ids already
//! emitted stand.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLockReadGuard;

use crate::error::DagError;
use crate::graph::Dag;
use crate::key::KeyPolicy;
use crate::store::Store;

/// Per-vertex callback for the whole-graph walks.
///
/// Implemented for every `FnMut(&str, &T)` closure, so most callers never
/// name the trait.
pub trait Visitor<T> {
    /// Invoked once per vertex, in visitation order.
    fn visit(&mut self, id: &str, payload: &T);
}

impl<T, F> Visitor<T> for F
where
    F: FnMut(&str, &T),
{
    fn visit(&mut self, id: &str, payload: &T) {
        self(id, payload)
    }
}

/// Vertex ids in depth-first order: lowest-id root first, children explored
/// in ascending id order.
pub(crate) fn dfs_order<T, K>(store: &Store<T, K>) -> Vec<String>
where
    K: Clone + Eq + std::hash::Hash,
{
    let mut roots = store.root_ids();
    roots.sort_unstable();

    let mut stack: Vec<String> = roots.into_iter().rev().collect();
    let mut visited: HashSet<String> = HashSet::new();
    let mut order = Vec::with_capacity(store.order());

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(key) = store.key_of_id(&id) {
            let mut children = store.sorted_child_ids(key);
            children.reverse();
            stack.extend(children);
        }
        order.push(id);
    }
    order
}

/// Vertex ids in breadth-first order from the sorted roots.
pub(crate) fn bfs_order<T, K>(store: &Store<T, K>) -> Vec<String>
where
    K: Clone + Eq + std::hash::Hash,
{
    let mut roots = store.root_ids();
    roots.sort_unstable();

    let mut queue: VecDeque<String> = roots.into();
    let mut visited: HashSet<String> = HashSet::new();
    let mut order = Vec::with_capacity(store.order());

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(key) = store.key_of_id(&id) {
            queue.extend(store.sorted_child_ids(key));
        }
        order.push(id);
    }
    order
}

/// Vertex ids in topological order: a vertex is emitted only once all its
/// parents have been, re-enqueueing it otherwise.
pub(crate) fn topo_order<T, K>(store: &Store<T, K>) -> Vec<String>
where
    K: Clone + Eq + std::hash::Hash,
{
    let mut roots = store.root_ids();
    roots.sort_unstable();

    let mut queue: VecDeque<String> = roots.into();
    let mut visited: HashSet<String> = HashSet::new();
    let mut order = Vec::with_capacity(store.order());

    while let Some(id) = queue.pop_front() {
        if visited.contains(&id) {
            continue;
        }
        let Some(key) = store.key_of_id(&id) else {
            continue;
        };
        // Not ready yet: some parent is still unvisited. Progress is always
        // possible in an acyclic graph, so the queue drains.
        if store
            .sorted_parent_ids(key)
            .iter()
            .any(|parent| !visited.contains(parent))
        {
            queue.push_back(id);
            continue;
        }
        visited.insert(id.clone());
        queue.extend(store.sorted_child_ids(key));
        order.push(id);
    }
    order
}

/// Consumer-held cancellation signal for a walker.
///
/// Clonable and `Send`; raising it from any thread makes the walker stop at
/// its next yield point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Stops the associated walker at its next yield point.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Breadth-first stream of ancestor or descendant ids.
///
/// Holds the graph read lock for its whole lifetime; see the module docs for
/// the consumption contract.
pub struct ReachWalker<'a, T, P: KeyPolicy<T>> {
    store: RwLockReadGuard<'a, Store<T, P::Key>>,
    fifo: VecDeque<P::Key>,
    visited: HashSet<P::Key>,
    ascending: bool,
    cancel: CancelToken,
}

impl<T, P: KeyPolicy<T>> ReachWalker<'_, T, P> {
    /// The cancellation signal paired with this walker.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn enqueue_neighbours(&mut self, key: &P::Key) {
        let neighbour_ids = if self.ascending {
            self.store.sorted_parent_ids(key)
        } else {
            self.store.sorted_child_ids(key)
        };
        for id in neighbour_ids {
            if let Some(neighbour) = self.store.key_of_id(&id) {
                if self.visited.insert(neighbour.clone()) {
                    self.fifo.push_back(neighbour.clone());
                }
            }
        }
    }
}

impl<T, P: KeyPolicy<T>> Iterator for ReachWalker<'_, T, P> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let key = self.fifo.pop_front()?;
        self.enqueue_neighbours(&key);
        self.store.id_of(&key).map(str::to_string)
    }
}

impl<T, P: KeyPolicy<T>> Dag<T, P> {
    /// Walks the whole graph depth-first; lowest-id root first, children in
    /// ascending id order.
    pub fn dfs_walk<V: Visitor<T>>(&self, visitor: &mut V) {
        let store = self.store().read();
        for id in dfs_order(&store) {
            if let Some(payload) = store.payload(&id) {
                visitor.visit(&id, payload);
            }
        }
    }

    /// Walks the whole graph breadth-first from the sorted roots.
    pub fn bfs_walk<V: Visitor<T>>(&self, visitor: &mut V) {
        let store = self.store().read();
        for id in bfs_order(&store) {
            if let Some(payload) = store.payload(&id) {
                visitor.visit(&id, payload);
            }
        }
    }

    /// Walks the whole graph in topological order: for every edge `a -> b`,
    /// `a` is visited before `b`.
    pub fn ordered_walk<V: Visitor<T>>(&self, visitor: &mut V) {
        let store = self.store().read();
        for id in topo_order(&store) {
            if let Some(payload) = store.payload(&id) {
                visitor.visit(&id, payload);
            }
        }
    }

    /// Streams the descendants of `id` in breadth-first order.
    pub fn descendants_walker(&self, id: &str) -> Result<ReachWalker<'_, T, P>, DagError> {
        self.walker(id, false)
    }

    /// Streams the ancestors of `id` in breadth-first order.
    pub fn ancestors_walker(&self, id: &str) -> Result<ReachWalker<'_, T, P>, DagError> {
        self.walker(id, true)
    }

    /// Descendant ids of `id` in breadth-first order, first occurrence only.
    ///
    /// Built on the walker, not the memoised reachability sets.
    pub fn get_ordered_descendants(&self, id: &str) -> Result<Vec<String>, DagError> {
        Ok(self.descendants_walker(id)?.collect())
    }

    /// Ancestor ids of `id` in breadth-first order, first occurrence only.
    pub fn get_ordered_ancestors(&self, id: &str) -> Result<Vec<String>, DagError> {
        Ok(self.ancestors_walker(id)?.collect())
    }

    fn walker(&self, id: &str, ascending: bool) -> Result<ReachWalker<'_, T, P>, DagError> {
        let store = self.store().read();
        let origin = Self::key_in(&store, id)?;

        let mut walker = ReachWalker {
            store,
            fifo: VecDeque::new(),
            visited: HashSet::new(),
            ascending,
            cancel: CancelToken::default(),
        };
        // Seed with the origin's direct neighbours; the origin itself is not
        // part of the stream.
        walker.enqueue_neighbours(&origin);
        Ok(walker)
    }
}
